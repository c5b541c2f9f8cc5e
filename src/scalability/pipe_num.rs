// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decision of the number of pipes a frame is decoded with.

use log::debug;
use log::warn;

use crate::scalability::partition::SplitPolicy;
use crate::scalability::Result;
use crate::scalability::ScalabilityError;
use crate::Resolution;
use crate::SurfaceFormat;

pub const HEVC_MAX_TILE_COLUMNS: u8 = 20;
pub const HEVC_MAX_TILE_ROWS: u8 = 22;

/// Pictures not wider than this are not split with [`SplitPolicy::FirstColumnAligned`] on two
/// engines.
const FIRST_COLUMN_ALIGNED_MIN_WIDTH: u32 = 2048;

/// Hardware resources available for decoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HwCapability {
    /// Number of video decode engines.
    pub num_vdbox: u8,
}

/// Properties of a picture the pipe number depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipeNumParams {
    pub resolution: Resolution,
    pub format: SurfaceFormat,
    pub tiles_enabled: bool,
    pub tile_columns: u8,
    pub tile_rows: u8,
    /// Whether post-decode scaling is used for this frame. The scaler only accepts the output of
    /// a single pipe.
    pub using_sfc: bool,
    pub secure_decode: bool,
}

/// Limits of the real tile decoding mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RealTileCaps {
    pub enabled: bool,
    pub max_tile_columns: u8,
    pub max_tile_rows: u8,
    /// Whether pictures with more tile columns than pipes can be decoded in several phases.
    pub multi_phase: bool,
}

impl Default for RealTileCaps {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tile_columns: HEVC_MAX_TILE_COLUMNS,
            max_tile_rows: HEVC_MAX_TILE_ROWS,
            multi_phase: true,
        }
    }
}

impl PipeNumParams {
    /// Whether the tile structure of the picture allows real tile decoding.
    pub fn real_tile_possible(&self, caps: &RealTileCaps) -> bool {
        caps.enabled
            && self.tiles_enabled
            && self.tile_columns > 1
            && self.tile_columns <= caps.max_tile_columns
            && self.tile_rows <= caps.max_tile_rows
    }
}

/// Picture area from which a number of pipes is used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PipeTier {
    pub min_area: u64,
    pub pipe_num: u8,
}

impl PipeTier {
    pub fn new(width: u32, height: u32, pipe_num: u8) -> Self {
        Self {
            min_area: Resolution::from((width, height)).area(),
            pipe_num,
        }
    }
}

/// Pipe number tiers for standard and range extension formats.
///
/// A picture uses the largest pipe number among the tiers its area reaches, which keeps the
/// decision monotonic whatever the order of the tiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionThresholds {
    /// Tiers for 4:2:0 formats of 10 bits or less.
    pub standard: Vec<PipeTier>,
    /// Tiers for every other format.
    pub range_extension: Vec<PipeTier>,
}

impl Default for ResolutionThresholds {
    fn default() -> Self {
        Self {
            standard: vec![PipeTier::new(3840, 2160, 2), PipeTier::new(7680, 4320, 3)],
            range_extension: vec![PipeTier::new(3840, 1716, 2), PipeTier::new(7680, 4320, 3)],
        }
    }
}

impl ResolutionThresholds {
    pub fn tiers(&self, format: SurfaceFormat) -> &[PipeTier] {
        if format.is_standard() {
            &self.standard
        } else {
            &self.range_extension
        }
    }

    /// Returns the number of pipes `resolution` calls for, 1 if it is below every tier.
    pub fn pipe_num_for(&self, format: SurfaceFormat, resolution: Resolution) -> u8 {
        let area = resolution.area();

        self.tiers(format)
            .iter()
            .filter(|tier| area >= tier.min_area)
            .map(|tier| tier.pipe_num)
            .max()
            .unwrap_or(1)
    }
}

/// Debugging knobs for the pipe number decision.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipeNumOverrides {
    /// Width from which 2 pipes are used, replacing the resolution tiers.
    pub switch_width_2_pipes: Option<u32>,
    /// Width from which 3 pipes are used. Only honored along with `switch_width_2_pipes`.
    pub switch_width_3_pipes: Option<u32>,
    /// Split every frame, whatever its size.
    pub always_frame_split: bool,
    /// Number of pipes to use with `always_frame_split`. Defaults to 2.
    pub user_pipe_num: Option<u8>,
    /// Logical ids of the engines to decode on. The pipe number is the number of engines.
    pub engine_instances: Option<Vec<u8>>,
}

/// Strategy deciding how many pipes a frame is decoded with.
pub trait PipeNumDecider {
    /// Returns the number of pipes to decode a picture of `params` with, between 1 and the
    /// number of engines of `hw`.
    fn decide_pipe_num(
        &self,
        params: &PipeNumParams,
        hw: &HwCapability,
        overrides: &PipeNumOverrides,
    ) -> Result<u8>;
}

/// Pipe number decision based on resolution tiers and the tile structure of the picture.
#[derive(Clone, Debug, Default)]
pub struct ThresholdPipeNumDecider {
    pub thresholds: ResolutionThresholds,
    pub real_tile: RealTileCaps,
    pub split_policy: SplitPolicy,
}

impl ThresholdPipeNumDecider {
    fn by_resolution(&self, params: &PipeNumParams, overrides: &PipeNumOverrides) -> u8 {
        let width = params.resolution.width;

        match (overrides.switch_width_2_pipes, overrides.switch_width_3_pipes) {
            (Some(_), Some(th2)) if width >= th2 => 3,
            (Some(th1), _) if width >= th1 => 2,
            (Some(_), _) => 1,
            (None, _) => self.thresholds.pipe_num_for(params.format, params.resolution),
        }
    }
}

impl PipeNumDecider for ThresholdPipeNumDecider {
    fn decide_pipe_num(
        &self,
        params: &PipeNumParams,
        hw: &HwCapability,
        overrides: &PipeNumOverrides,
    ) -> Result<u8> {
        if params.resolution.is_empty() {
            return Err(ScalabilityError::InvalidParameter(format!(
                "invalid picture size {}x{}",
                params.resolution.width, params.resolution.height
            )));
        }

        if hw.num_vdbox == 0 {
            return Err(ScalabilityError::InvalidParameter(
                "no video decode engine available".into(),
            ));
        }

        if params.using_sfc || hw.num_vdbox == 1 {
            return Ok(1);
        }

        if let Some(instances) = &overrides.engine_instances {
            return pipe_num_for_engine_instances(instances, hw);
        }

        if overrides.always_frame_split {
            let pipe_num = match overrides.user_pipe_num {
                Some(n) if (2..=hw.num_vdbox).contains(&n) => n,
                Some(n) => {
                    warn!("ignoring user pipe number {} with {} engines", n, hw.num_vdbox);
                    2
                }
                None => 2,
            };

            return Ok(pipe_num);
        }

        let mut pipe_num = self.by_resolution(params, overrides);

        if params.real_tile_possible(&self.real_tile) && !params.secure_decode {
            pipe_num = pipe_num.max(2);
        }

        // The only exception to a pipe number growing with the picture area.
        if self.split_policy == SplitPolicy::FirstColumnAligned
            && hw.num_vdbox == 2
            && params.resolution.width <= FIRST_COLUMN_ALIGNED_MIN_WIDTH
        {
            pipe_num = 1;
        }

        let pipe_num = pipe_num.clamp(1, hw.num_vdbox);
        debug!(
            "{}x{} {:?} on {} engines: {} pipe(s)",
            params.resolution.width, params.resolution.height, params.format, hw.num_vdbox, pipe_num
        );

        Ok(pipe_num)
    }
}

fn pipe_num_for_engine_instances(instances: &[u8], hw: &HwCapability) -> Result<u8> {
    match u8::try_from(instances.len()) {
        Ok(count) if count >= 1 && count <= hw.num_vdbox => Ok(count),
        _ => Err(ScalabilityError::InvalidParameter(format!(
            "cannot decode on engines {:?}: {} engines available",
            instances, hw.num_vdbox
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: [SurfaceFormat; 5] = [
        SurfaceFormat::NV12,
        SurfaceFormat::P010,
        SurfaceFormat::P016,
        SurfaceFormat::Y210,
        SurfaceFormat::AYUV,
    ];

    fn params(width: u32, height: u32, format: SurfaceFormat) -> PipeNumParams {
        PipeNumParams {
            resolution: Resolution::from((width, height)),
            format,
            ..Default::default()
        }
    }

    fn decide(params: &PipeNumParams, num_vdbox: u8) -> u8 {
        ThresholdPipeNumDecider::default()
            .decide_pipe_num(params, &HwCapability { num_vdbox }, &Default::default())
            .unwrap()
    }

    fn resolutions() -> Vec<Resolution> {
        let mut resolutions = vec![];
        for width in (64..=8192).step_by(128) {
            for height in (64..=8192).step_by(256) {
                resolutions.push(Resolution::from((width, height)));
            }
        }
        // The tier boundaries themselves.
        resolutions.extend([
            Resolution::from((3840, 1716)),
            Resolution::from((3840, 2160)),
            Resolution::from((7680, 4320)),
        ]);
        resolutions.sort_by_key(|r| r.area());
        resolutions
    }

    #[test]
    fn monotonic_in_area() {
        let resolutions = resolutions();
        let policies = [
            SplitPolicy::Even,
            SplitPolicy::FirstColumnAligned,
            SplitPolicy::FixedFirstColumn(100),
        ];

        for split_policy in policies {
            let decider = ThresholdPipeNumDecider {
                split_policy,
                ..Default::default()
            };

            for format in FORMATS {
                for num_vdbox in 1..=6 {
                    let hw = HwCapability { num_vdbox };
                    let mut previous = 1;
                    for resolution in &resolutions {
                        // Narrow pictures are not split with an aligned first column on two
                        // engines, whatever their area.
                        if split_policy == SplitPolicy::FirstColumnAligned
                            && num_vdbox == 2
                            && resolution.width <= FIRST_COLUMN_ALIGNED_MIN_WIDTH
                        {
                            continue;
                        }

                        let pipe_num = decider
                            .decide_pipe_num(
                                &params(resolution.width, resolution.height, format),
                                &hw,
                                &Default::default(),
                            )
                            .unwrap();
                        assert!(
                            pipe_num >= previous,
                            "{:?} {:?} {:?} with {} engines: {} pipes, fewer than {}",
                            split_policy,
                            resolution,
                            format,
                            num_vdbox,
                            pipe_num,
                            previous
                        );
                        previous = pipe_num;
                    }
                }
            }
        }
    }

    #[test]
    fn capped_by_engine_count() {
        let overrides = [
            PipeNumOverrides::default(),
            PipeNumOverrides {
                always_frame_split: true,
                user_pipe_num: Some(4),
                ..Default::default()
            },
            PipeNumOverrides {
                switch_width_2_pipes: Some(1000),
                switch_width_3_pipes: Some(2000),
                ..Default::default()
            },
        ];

        for resolution in resolutions() {
            for num_vdbox in 1..=4 {
                for tiles_enabled in [false, true] {
                    for overrides in &overrides {
                        let params = PipeNumParams {
                            tiles_enabled,
                            tile_columns: 4,
                            tile_rows: 2,
                            ..params(resolution.width, resolution.height, SurfaceFormat::NV12)
                        };
                        let pipe_num = ThresholdPipeNumDecider::default()
                            .decide_pipe_num(&params, &HwCapability { num_vdbox }, overrides)
                            .unwrap();

                        assert!((1..=num_vdbox).contains(&pipe_num));
                    }
                }
            }
        }
    }

    #[test]
    fn standard_4k_uses_two_pipes() {
        assert_eq!(decide(&params(3840, 2160, SurfaceFormat::NV12), 3), 2);
        assert_eq!(decide(&params(3840, 2160, SurfaceFormat::NV12), 2), 2);
        assert_eq!(decide(&params(1920, 1080, SurfaceFormat::NV12), 3), 1);
    }

    #[test]
    fn range_extension_tiers() {
        assert_eq!(decide(&params(3840, 1716, SurfaceFormat::NV12), 3), 1);
        assert_eq!(decide(&params(3840, 1716, SurfaceFormat::Y210), 3), 2);
        assert_eq!(decide(&params(3840, 1716, SurfaceFormat::P016), 3), 2);
    }

    #[test]
    fn eight_k() {
        assert_eq!(decide(&params(7680, 4320, SurfaceFormat::NV12), 4), 3);
        assert_eq!(decide(&params(7680, 4320, SurfaceFormat::NV12), 3), 3);
        assert_eq!(decide(&params(7680, 4320, SurfaceFormat::NV12), 2), 2);
        assert_eq!(decide(&params(7680, 4320, SurfaceFormat::NV12), 1), 1);
    }

    #[test]
    fn post_decode_scaling_forces_single_pipe() {
        let overrides = [
            PipeNumOverrides::default(),
            PipeNumOverrides {
                engine_instances: Some(vec![0, 1]),
                ..Default::default()
            },
            PipeNumOverrides {
                engine_instances: Some(vec![0, 1, 2, 3, 4]),
                ..Default::default()
            },
            PipeNumOverrides {
                always_frame_split: true,
                user_pipe_num: Some(3),
                ..Default::default()
            },
            PipeNumOverrides {
                switch_width_2_pipes: Some(64),
                switch_width_3_pipes: Some(128),
                ..Default::default()
            },
        ];
        let params = PipeNumParams {
            using_sfc: true,
            tiles_enabled: true,
            tile_columns: 4,
            tile_rows: 1,
            ..params(7680, 4320, SurfaceFormat::NV12)
        };
        let decider = ThresholdPipeNumDecider::default();

        for num_vdbox in 1..=4 {
            for overrides in &overrides {
                let pipe_num = decider
                    .decide_pipe_num(&params, &HwCapability { num_vdbox }, overrides)
                    .unwrap();
                assert_eq!(pipe_num, 1, "{:?} with {} engines", overrides, num_vdbox);
            }
        }
    }

    #[test]
    fn real_tile_eligibility() {
        let tiled = PipeNumParams {
            tiles_enabled: true,
            tile_columns: 4,
            tile_rows: 1,
            ..params(1920, 1080, SurfaceFormat::NV12)
        };
        assert_eq!(decide(&tiled, 3), 2);

        let secure = PipeNumParams {
            secure_decode: true,
            ..tiled.clone()
        };
        assert_eq!(decide(&secure, 3), 1);

        let too_many_columns = PipeNumParams {
            tile_columns: HEVC_MAX_TILE_COLUMNS + 1,
            ..tiled.clone()
        };
        assert_eq!(decide(&too_many_columns, 3), 1);

        let one_column = PipeNumParams {
            tile_columns: 1,
            ..tiled
        };
        assert_eq!(decide(&one_column, 3), 1);
    }

    #[test]
    fn first_column_aligned_needs_wide_pictures() {
        let decider = ThresholdPipeNumDecider {
            split_policy: SplitPolicy::FirstColumnAligned,
            ..Default::default()
        };
        let params = PipeNumParams {
            tiles_enabled: true,
            tile_columns: 2,
            ..params(2048, 4096, SurfaceFormat::NV12)
        };

        let pipe_num = decider
            .decide_pipe_num(&params, &HwCapability { num_vdbox: 2 }, &Default::default())
            .unwrap();
        assert_eq!(pipe_num, 1);

        // With more engines, the usual decision applies.
        for num_vdbox in 3..=6 {
            let hw = HwCapability { num_vdbox };
            assert_eq!(decider.decide_pipe_num(&params, &hw, &Default::default()).unwrap(), 2);

            let untiled = self::params(2048, 8192, SurfaceFormat::NV12);
            assert_eq!(
                decider.decide_pipe_num(&untiled, &hw, &Default::default()).unwrap(),
                decide(&untiled, num_vdbox)
            );
        }
    }

    #[test]
    fn user_thresholds() {
        let overrides = PipeNumOverrides {
            switch_width_2_pipes: Some(1280),
            switch_width_3_pipes: Some(2560),
            ..Default::default()
        };
        let decider = ThresholdPipeNumDecider::default();
        let hw = HwCapability { num_vdbox: 3 };

        let decide = |width| {
            decider
                .decide_pipe_num(&params(width, 720, SurfaceFormat::NV12), &hw, &overrides)
                .unwrap()
        };
        assert_eq!(decide(1024), 1);
        assert_eq!(decide(1280), 2);
        assert_eq!(decide(2560), 3);
    }

    #[test]
    fn always_frame_split() {
        let decider = ThresholdPipeNumDecider::default();
        let params = params(640, 480, SurfaceFormat::NV12);

        let mut overrides = PipeNumOverrides {
            always_frame_split: true,
            ..Default::default()
        };
        let hw = HwCapability { num_vdbox: 4 };
        assert_eq!(decider.decide_pipe_num(&params, &hw, &overrides).unwrap(), 2);

        overrides.user_pipe_num = Some(3);
        assert_eq!(decider.decide_pipe_num(&params, &hw, &overrides).unwrap(), 3);

        overrides.user_pipe_num = Some(5);
        assert_eq!(decider.decide_pipe_num(&params, &hw, &overrides).unwrap(), 2);
    }

    #[test]
    fn engine_instances() {
        let decider = ThresholdPipeNumDecider::default();
        let params = params(640, 480, SurfaceFormat::NV12);
        let hw = HwCapability { num_vdbox: 2 };

        let overrides = PipeNumOverrides {
            engine_instances: Some(vec![0, 1]),
            ..Default::default()
        };
        assert_eq!(decider.decide_pipe_num(&params, &hw, &overrides).unwrap(), 2);

        let overrides = PipeNumOverrides {
            engine_instances: Some(vec![0, 1, 2]),
            ..Default::default()
        };
        assert!(matches!(
            decider.decide_pipe_num(&params, &hw, &overrides),
            Err(ScalabilityError::InvalidParameter(_))
        ));
    }

    #[test]
    fn invalid_inputs() {
        let decider = ThresholdPipeNumDecider::default();

        assert!(decider
            .decide_pipe_num(
                &params(0, 1080, SurfaceFormat::NV12),
                &HwCapability { num_vdbox: 2 },
                &Default::default()
            )
            .is_err());
        assert!(decider
            .decide_pipe_num(
                &params(1920, 1080, SurfaceFormat::NV12),
                &HwCapability { num_vdbox: 0 },
                &Default::default()
            )
            .is_err());
    }
}
