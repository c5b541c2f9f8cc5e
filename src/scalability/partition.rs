// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Split of a picture into the column ranges decoded by each pipe.
//!
//! Column ranges are expressed in minimum coding blocks, the granularity the hardware uses to
//! program tile boundaries. Virtual tiles are always made of whole largest coding blocks (LCUs),
//! except for the last one which ends with the picture.

use std::ops::Range;
use std::str::FromStr;

use log::debug;
use log::error;

use crate::backend::BufferIndex;
use crate::scalability::phase::Phase;
use crate::scalability::router::buffer_index_for;
use crate::scalability::router::submission_role_for;
use crate::scalability::router::SubmissionRole;
use crate::scalability::Result;
use crate::scalability::ScalabilityError;
use crate::Resolution;

/// Narrowest virtual tile the hardware can decode, in LCUs.
pub const MIN_VIRTUAL_TILE_WIDTH_IN_LCU: u32 = 2;

/// Width of the first column when splitting with [`SplitPolicy::FirstColumnAligned`].
const FIRST_COLUMN_WIDTH: u32 = 2048;
/// Same as [`FIRST_COLUMN_WIDTH`], for pictures of 8K or more.
const FIRST_COLUMN_WIDTH_8K: u32 = 4096;
const AREA_8K: u64 = 7680 * 4320;

const VP9_MIN_BLOCK_SIZE: u32 = 8;
const VP9_SUPER_BLOCK_SIZE: u32 = 64;

/// Picture size and coding block sizes of a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodingGeometry {
    pub resolution: Resolution,
    /// Size of the minimum coding block, in pixels.
    pub min_cb_size: u32,
    /// Size of the largest coding block, in pixels.
    pub max_cb_size: u32,
}

impl CodingGeometry {
    /// Builds the geometry of an HEVC picture from its SPS syntax elements.
    pub fn hevc(
        resolution: Resolution,
        log2_min_luma_coding_block_size_minus3: u8,
        log2_diff_max_min_luma_coding_block_size: u8,
    ) -> Result<Self> {
        let log2_min_cb_size = u32::from(log2_min_luma_coding_block_size_minus3) + 3;
        let log2_max_cb_size = log2_min_cb_size + u32::from(log2_diff_max_min_luma_coding_block_size);

        if !(4..=6).contains(&log2_max_cb_size) {
            return Err(ScalabilityError::InvalidParameter(format!(
                "unsupported CTB size {}",
                1u32 << log2_max_cb_size.min(31)
            )));
        }

        Self::new(resolution, 1 << log2_min_cb_size, 1 << log2_max_cb_size)
    }

    /// Builds the geometry of a VP9 picture: 8x8 minimum blocks, 64x64 super blocks.
    pub fn vp9(resolution: Resolution) -> Self {
        Self {
            resolution,
            min_cb_size: VP9_MIN_BLOCK_SIZE,
            max_cb_size: VP9_SUPER_BLOCK_SIZE,
        }
    }

    pub fn new(resolution: Resolution, min_cb_size: u32, max_cb_size: u32) -> Result<Self> {
        if resolution.is_empty() {
            return Err(ScalabilityError::InvalidParameter(format!(
                "empty picture {}x{}",
                resolution.width, resolution.height
            )));
        }

        if !min_cb_size.is_power_of_two()
            || !max_cb_size.is_power_of_two()
            || min_cb_size > max_cb_size
        {
            return Err(ScalabilityError::InvalidParameter(format!(
                "invalid coding block sizes: min {}, max {}",
                min_cb_size, max_cb_size
            )));
        }

        Ok(Self {
            resolution,
            min_cb_size,
            max_cb_size,
        })
    }

    pub fn width_in_min_cb(&self) -> u32 {
        self.resolution.width.div_ceil(self.min_cb_size)
    }

    pub fn width_in_lcu(&self) -> u32 {
        self.resolution.width.div_ceil(self.max_cb_size)
    }

    pub fn height_in_lcu(&self) -> u32 {
        self.resolution.height.div_ceil(self.max_cb_size)
    }

    /// log2 of the largest coding block size.
    pub fn ctb_log2_size(&self) -> u8 {
        self.max_cb_size.trailing_zeros() as u8
    }

    fn lcu_to_min_cb(&self, lcus: u32) -> u32 {
        lcus * (self.max_cb_size / self.min_cb_size)
    }
}

/// How to split a picture between pipes in virtual tile mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Near-equal columns of whole LCUs.
    #[default]
    Even,
    /// Two columns, the first one being 2048 pixels wide (4096 for 8K pictures). Required by
    /// some memory compression configurations.
    FirstColumnAligned,
    /// Two columns, the first one being the given number of minimum coding blocks wide. For
    /// debugging.
    FixedFirstColumn(u32),
}

impl SplitPolicy {
    /// Largest number of pipes a picture can be split between with this policy.
    pub fn max_pipe_num(&self) -> u8 {
        match self {
            SplitPolicy::Even => u8::MAX,
            SplitPolicy::FirstColumnAligned | SplitPolicy::FixedFirstColumn(_) => 2,
        }
    }
}

impl FromStr for SplitPolicy {
    type Err = &'static str;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "even" => Ok(SplitPolicy::Even),
            "first-column-aligned" => Ok(SplitPolicy::FirstColumnAligned),
            _ => Err("unrecognized split policy. Valid values: even, first-column-aligned"),
        }
    }
}

/// Work of one pipe during one phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipeAssignment {
    pub pipe: u8,
    /// Real tile phase. Always 0 in virtual tile mode.
    pub phase: u8,
    /// Columns to decode, in minimum coding blocks.
    pub columns: Range<u32>,
    /// Index of the first LCU column.
    pub start_lcu: u32,
    pub buffer: BufferIndex,
    pub role: SubmissionRole,
}

impl PipeAssignment {
    pub fn width_in_min_cb(&self) -> u32 {
        self.columns.end - self.columns.start
    }
}

/// Distribution of the tile columns of a picture over pipes and phases.
///
/// Tile column `c` is decoded by pipe `c % pipe_num` during phase `c / pipe_num`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RealTileLayout {
    pipe_num: u8,
    tile_columns: u8,
    phase_num: u8,
    pipes_in_last_phase: u8,
}

impl RealTileLayout {
    /// Creates the layout of `tile_columns` columns over `pipe_num` pipes.
    ///
    /// Pipes beyond the number of tile columns would have nothing to do, so the number of pipes
    /// is reduced to the number of tile columns if needed.
    pub fn new(pipe_num: u8, tile_columns: u8) -> Result<Self> {
        if pipe_num == 0 || tile_columns == 0 {
            return Err(ScalabilityError::InvalidParameter(format!(
                "cannot lay out {} tile columns over {} pipes",
                tile_columns, pipe_num
            )));
        }

        let pipe_num = pipe_num.min(tile_columns);
        let phase_num = tile_columns.div_ceil(pipe_num);
        let pipes_in_last_phase = tile_columns - pipe_num * (phase_num - 1);

        Ok(Self {
            pipe_num,
            tile_columns,
            phase_num,
            pipes_in_last_phase,
        })
    }

    pub fn pipe_num(&self) -> u8 {
        self.pipe_num
    }

    pub fn tile_columns(&self) -> u8 {
        self.tile_columns
    }

    pub fn phase_num(&self) -> u8 {
        self.phase_num
    }

    pub fn pipes_in_last_phase(&self) -> u8 {
        self.pipes_in_last_phase
    }

    /// Number of pipes taking part in `phase`.
    pub fn pipes_in_phase(&self, phase: u8) -> u8 {
        if phase == self.phase_num - 1 {
            self.pipes_in_last_phase
        } else if phase < self.phase_num {
            self.pipe_num
        } else {
            0
        }
    }

    /// Tile column decoded by `pipe` during `phase`.
    pub fn column(&self, phase: u8, pipe: u8) -> u8 {
        pipe + phase * self.pipe_num
    }

    /// Returns the pass following `(phase, pipe)`, if any.
    pub fn next_pass(&self, phase: u8, pipe: u8) -> Option<(u8, u8)> {
        if pipe + 1 < self.pipes_in_phase(phase) {
            Some((phase, pipe + 1))
        } else if phase + 1 < self.phase_num {
            Some((phase + 1, 0))
        } else {
            None
        }
    }

    pub fn is_last_pass(&self, phase: u8, pipe: u8) -> bool {
        phase == self.phase_num - 1 && pipe + 1 == self.pipes_in_last_phase
    }

    pub fn is_last_pass_of_phase(&self, phase: u8, pipe: u8) -> bool {
        pipe + 1 == self.pipes_in_phase(phase)
    }

    /// Phase during which `pipe` decodes its last tile column.
    pub fn last_phase_of_pipe(&self, pipe: u8) -> u8 {
        if pipe < self.pipes_in_last_phase {
            self.phase_num - 1
        } else {
            self.phase_num.saturating_sub(2)
        }
    }
}

/// Tile column boundaries signaled by the bitstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TileColumns {
    /// Given number of columns, uniformly spaced.
    Uniform(u8),
    /// Widths in LCUs of all the columns but the last one, which takes the remaining width.
    Explicit(Vec<u32>),
}

impl TileColumns {
    pub fn count(&self) -> usize {
        match self {
            TileColumns::Uniform(count) => usize::from(*count),
            TileColumns::Explicit(widths) => widths.len() + 1,
        }
    }

    /// Returns the first LCU column of each tile column, followed by `width_in_lcu`.
    fn boundaries(&self, width_in_lcu: u32) -> Result<Vec<u32>> {
        let boundaries: Vec<u32> = match self {
            TileColumns::Uniform(count) => {
                let count = u32::from(*count);
                (0..=count).map(|i| i * width_in_lcu / count.max(1)).collect()
            }
            TileColumns::Explicit(widths) => std::iter::once(0)
                .chain(widths.iter().scan(0u32, |start, width| {
                    *start = start.saturating_add(*width);
                    Some(*start)
                }))
                .chain(std::iter::once(width_in_lcu))
                .collect(),
        };

        if boundaries.len() < 2 || boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ScalabilityError::InvalidParameter(format!(
                "tile columns {:?} do not fit a picture {} LCUs wide",
                self, width_in_lcu
            )));
        }

        Ok(boundaries)
    }
}

/// Splits a picture between `pipe_num` pipes in virtual tile mode.
///
/// Each pipe gets one back-end phase over its column range.
pub fn partition(
    pipe_num: u8,
    geometry: &CodingGeometry,
    policy: SplitPolicy,
    fe_separate_submission: bool,
) -> Result<Vec<PipeAssignment>> {
    let total = geometry.width_in_min_cb();

    if pipe_num == 0 {
        return Err(ScalabilityError::InvalidParameter("cannot split between 0 pipes".into()));
    }

    if pipe_num == 1 {
        return Ok(vec![PipeAssignment {
            pipe: 0,
            phase: 0,
            columns: 0..total,
            start_lcu: 0,
            buffer: BufferIndex::Primary,
            role: submission_role_for(Phase::Legacy, 1, None),
        }]);
    }

    let columns = match policy {
        SplitPolicy::Even => split_even(pipe_num, geometry)?,
        SplitPolicy::FirstColumnAligned => {
            let first_width = if geometry.resolution.area() >= AREA_8K {
                FIRST_COLUMN_WIDTH_8K
            } else {
                FIRST_COLUMN_WIDTH
            };

            if geometry.resolution.width <= first_width {
                return Err(ScalabilityError::UnsupportedPartition(format!(
                    "picture width {} does not exceed the first column width {}",
                    geometry.resolution.width, first_width
                )));
            }

            split_two(
                pipe_num,
                geometry,
                first_width.div_ceil(geometry.min_cb_size),
            )?
        }
        SplitPolicy::FixedFirstColumn(width_in_min_cb) => {
            split_two(pipe_num, geometry, width_in_min_cb)?
        }
    };

    let assignments = columns
        .into_iter()
        .zip(0u8..)
        .map(|((columns, start_lcu), pipe)| -> Result<PipeAssignment> {
            let phase = Phase::BackEnd(pipe);
            Ok(PipeAssignment {
                pipe,
                phase: 0,
                columns,
                start_lcu,
                buffer: buffer_index_for(phase, fe_separate_submission)?,
                role: submission_role_for(phase, pipe_num, None),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    check_coverage(&assignments, total)?;
    debug!("split {} min CBs between {} pipes: {:?}", total, pipe_num, assignments);

    Ok(assignments)
}

/// Returns `(columns, start_lcu)` for each pipe.
fn split_even(pipe_num: u8, geometry: &CodingGeometry) -> Result<Vec<(Range<u32>, u32)>> {
    let total = geometry.width_in_min_cb();
    let width_in_lcu = geometry.width_in_lcu();
    let n = u32::from(pipe_num);

    let mut start_lcu = 0;
    let mut columns = Vec::with_capacity(usize::from(pipe_num));

    for i in 0..n {
        let lcus = (i + 1) * width_in_lcu / n - i * width_in_lcu / n;
        if lcus < MIN_VIRTUAL_TILE_WIDTH_IN_LCU {
            return Err(ScalabilityError::UnsupportedPartition(format!(
                "pipe {} would decode {} LCU column(s), less than the minimum of {}",
                i, lcus, MIN_VIRTUAL_TILE_WIDTH_IN_LCU
            )));
        }

        let start = geometry.lcu_to_min_cb(start_lcu);
        // Rounding leftovers go to the last pipe.
        let end = if i + 1 == n {
            total
        } else {
            geometry.lcu_to_min_cb(start_lcu + lcus)
        };

        columns.push((start..end, start_lcu));
        start_lcu += lcus;
    }

    Ok(columns)
}

/// Splits the picture in two at `first_width` minimum coding blocks.
fn split_two(
    pipe_num: u8,
    geometry: &CodingGeometry,
    first_width: u32,
) -> Result<Vec<(Range<u32>, u32)>> {
    if pipe_num != 2 {
        return Err(ScalabilityError::InvalidParameter(format!(
            "a fixed first column requires 2 pipes, not {}",
            pipe_num
        )));
    }

    let total = geometry.width_in_min_cb();
    let min_cb_per_lcu = geometry.max_cb_size / geometry.min_cb_size;
    let second_start_lcu = first_width.div_ceil(min_cb_per_lcu);

    if first_width < geometry.lcu_to_min_cb(MIN_VIRTUAL_TILE_WIDTH_IN_LCU)
        || first_width >= total
        || geometry.width_in_lcu().saturating_sub(second_start_lcu) < MIN_VIRTUAL_TILE_WIDTH_IN_LCU
    {
        return Err(ScalabilityError::UnsupportedPartition(format!(
            "cannot split {} min CBs after column {}",
            total, first_width
        )));
    }

    Ok(vec![(0..first_width, 0), (first_width..total, second_start_lcu)])
}

/// Deals the tile columns of a picture to `pipe_num` pipes in real tile mode.
///
/// The number of pipes is reduced to the number of tile columns if there are fewer of them, the
/// returned layout holds the number of pipes actually used.
pub fn partition_real_tiles(
    pipe_num: u8,
    geometry: &CodingGeometry,
    tiles: &TileColumns,
) -> Result<(RealTileLayout, Vec<PipeAssignment>)> {
    let total = geometry.width_in_min_cb();
    let tile_columns = u8::try_from(tiles.count()).map_err(|_| {
        ScalabilityError::InvalidParameter(format!("too many tile columns: {}", tiles.count()))
    })?;
    let layout = RealTileLayout::new(pipe_num, tile_columns)?;
    let boundaries = tiles.boundaries(geometry.width_in_lcu())?;

    let mut assignments = Vec::with_capacity(usize::from(tile_columns));
    for phase in 0..layout.phase_num() {
        for pipe in 0..layout.pipes_in_phase(phase) {
            let column = usize::from(layout.column(phase, pipe));
            let start_lcu = boundaries[column];
            let end = if column + 1 == usize::from(tile_columns) {
                total
            } else {
                geometry.lcu_to_min_cb(boundaries[column + 1])
            };
            let phase_id = Phase::RealTile { phase, pipe };

            assignments.push(PipeAssignment {
                pipe,
                phase,
                columns: geometry.lcu_to_min_cb(start_lcu)..end,
                start_lcu,
                buffer: buffer_index_for(phase_id, false)?,
                role: submission_role_for(phase_id, layout.pipe_num(), Some(&layout)),
            });
        }
    }

    check_coverage(&assignments, total)?;
    debug!("real tile layout {:?}: {:?}", layout, assignments);

    Ok((layout, assignments))
}

/// Checks that `assignments` cover `[0, total)` exactly once, in order.
fn check_coverage(assignments: &[PipeAssignment], total: u32) -> Result<()> {
    let mut expected_start = 0;

    for assignment in assignments {
        if assignment.columns.start != expected_start || assignment.columns.is_empty() {
            error!("partition does not cover the picture: {:?}", assignments);
            return Err(ScalabilityError::InvalidParameter(format!(
                "column range {:?} of pipe {} does not start at {}",
                assignment.columns, assignment.pipe, expected_start
            )));
        }
        expected_start = assignment.columns.end;
    }

    if expected_start != total {
        error!("partition does not cover the picture: {:?}", assignments);
        return Err(ScalabilityError::InvalidParameter(format!(
            "partition ends at {} instead of {}",
            expected_start, total
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalability::router::PipeRole;

    fn geometry(width: u32, height: u32) -> CodingGeometry {
        CodingGeometry::new(Resolution::from((width, height)), 8, 64).unwrap()
    }

    #[test]
    fn even_split_covers_picture() {
        for pipe_num in 2..=4u8 {
            for width in (64..=8192).step_by(8) {
                let geometry = geometry(width, 2160);

                match partition(pipe_num, &geometry, SplitPolicy::Even, false) {
                    Ok(assignments) => {
                        assert_eq!(assignments.len(), usize::from(pipe_num));
                        let covered: u32 = assignments.iter().map(|a| a.width_in_min_cb()).sum();
                        assert_eq!(covered, geometry.width_in_min_cb());

                        for a in &assignments[..assignments.len() - 1] {
                            // Whole LCUs for every pipe but the last.
                            assert_eq!(a.width_in_min_cb() % 8, 0);
                            assert!(a.width_in_min_cb() >= 16);
                        }
                    }
                    Err(ScalabilityError::UnsupportedPartition(_)) => {
                        assert!(geometry.width_in_lcu() < u32::from(pipe_num) * 3);
                    }
                    Err(e) => panic!("unexpected error {}", e),
                }
            }
        }
    }

    #[test]
    fn even_split_4k() {
        let assignments = partition(2, &geometry(3840, 2160), SplitPolicy::Even, false).unwrap();

        assert_eq!(assignments[0].columns, 0..240);
        assert_eq!(assignments[0].start_lcu, 0);
        assert_eq!(assignments[0].buffer, BufferIndex::Secondary(1));
        assert_eq!(assignments[0].role.kind, PipeRole::Master);
        assert!(!assignments[0].role.is_last_pipe);

        assert_eq!(assignments[1].columns, 240..480);
        assert_eq!(assignments[1].start_lcu, 30);
        assert_eq!(assignments[1].buffer, BufferIndex::Secondary(2));
        assert_eq!(assignments[1].role.kind, PipeRole::Slave(0));
        assert!(assignments[1].role.is_last_pipe);
    }

    #[test]
    fn even_split_rounding_goes_to_last_pipe() {
        // 1000 pixels: 16 LCUs, 125 min CBs.
        let assignments = partition(3, &geometry(1000, 720), SplitPolicy::Even, true).unwrap();
        let widths: Vec<u32> = assignments.iter().map(|a| a.width_in_min_cb()).collect();

        assert_eq!(widths, vec![40, 40, 45]);
        assert_eq!(assignments[0].buffer, BufferIndex::Secondary(0));
    }

    #[test]
    fn too_narrow_for_even_split() {
        assert!(matches!(
            partition(3, &geometry(320, 240), SplitPolicy::Even, false),
            Err(ScalabilityError::UnsupportedPartition(_))
        ));
    }

    #[test]
    fn single_pipe_partition() {
        let assignments = partition(1, &geometry(1920, 1080), SplitPolicy::Even, false).unwrap();

        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].columns, 0..240);
        assert_eq!(assignments[0].buffer, BufferIndex::Primary);
        assert_eq!(assignments[0].role.kind, PipeRole::Alone);
    }

    #[test]
    fn first_column_aligned() {
        let assignments =
            partition(2, &geometry(3840, 2160), SplitPolicy::FirstColumnAligned, false).unwrap();
        assert_eq!(assignments[0].columns, 0..256);
        assert_eq!(assignments[1].columns, 256..480);
        assert_eq!(assignments[1].start_lcu, 32);

        let assignments =
            partition(2, &geometry(7680, 4320), SplitPolicy::FirstColumnAligned, false).unwrap();
        assert_eq!(assignments[0].columns, 0..512);
        assert_eq!(assignments[1].start_lcu, 64);

        assert!(matches!(
            partition(2, &geometry(2048, 1080), SplitPolicy::FirstColumnAligned, false),
            Err(ScalabilityError::UnsupportedPartition(_))
        ));
        assert!(matches!(
            partition(3, &geometry(7680, 4320), SplitPolicy::FirstColumnAligned, false),
            Err(ScalabilityError::InvalidParameter(_))
        ));
    }

    #[test]
    fn fixed_first_column() {
        let assignments =
            partition(2, &geometry(1920, 1080), SplitPolicy::FixedFirstColumn(100), false)
                .unwrap();
        assert_eq!(assignments[0].columns, 0..100);
        assert_eq!(assignments[1].columns, 100..240);
        assert_eq!(assignments[1].start_lcu, 13);

        assert!(partition(2, &geometry(1920, 1080), SplitPolicy::FixedFirstColumn(240), false)
            .is_err());
    }

    #[test]
    fn fixed_first_column_minimum_width() {
        let geometry = geometry(1920, 1080);
        let min_width = geometry.lcu_to_min_cb(MIN_VIRTUAL_TILE_WIDTH_IN_LCU);

        for width in 0..min_width {
            assert!(
                matches!(
                    partition(2, &geometry, SplitPolicy::FixedFirstColumn(width), false),
                    Err(ScalabilityError::UnsupportedPartition(_))
                ),
                "first column of {} min CBs",
                width
            );
        }

        let assignments =
            partition(2, &geometry, SplitPolicy::FixedFirstColumn(min_width), false).unwrap();
        assert_eq!(assignments[0].columns, 0..min_width);
        assert_eq!(assignments[1].start_lcu, MIN_VIRTUAL_TILE_WIDTH_IN_LCU);
    }

    #[test]
    fn two_column_policies_cap_pipe_num() {
        assert_eq!(SplitPolicy::FirstColumnAligned.max_pipe_num(), 2);
        assert_eq!(SplitPolicy::FixedFirstColumn(100).max_pipe_num(), 2);
        assert!(SplitPolicy::Even.max_pipe_num() >= 8);
    }

    #[test]
    fn real_tile_five_columns_two_pipes() {
        let geometry = geometry(3840, 2160);
        let (layout, assignments) =
            partition_real_tiles(2, &geometry, &TileColumns::Uniform(5)).unwrap();

        assert_eq!(layout.phase_num(), 3);
        assert_eq!(layout.pipes_in_last_phase(), 1);

        let passes: Vec<(u8, u8)> = assignments.iter().map(|a| (a.phase, a.pipe)).collect();
        assert_eq!(passes, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0)]);

        // Tile columns [0, 1], [2, 3], [4] over the 60 LCU columns of the picture.
        let starts: Vec<u32> = assignments.iter().map(|a| a.start_lcu).collect();
        assert_eq!(starts, vec![0, 12, 24, 36, 48]);
        assert_eq!(assignments.last().unwrap().columns.end, 480);

        assert_eq!(assignments[1].role.kind, PipeRole::Slave(0));
        assert!(assignments[1].role.is_last_pipe);
        assert_eq!(assignments[4].role.kind, PipeRole::Master);
        assert!(assignments[4].role.is_last_pipe);
        assert_eq!(assignments[3].buffer, BufferIndex::Secondary(1));
    }

    #[test]
    fn real_tile_covers_picture() {
        for pipe_num in 1..=4u8 {
            for columns in 1..=20u8 {
                let geometry = geometry(7680, 4320);
                let (layout, assignments) =
                    partition_real_tiles(pipe_num, &geometry, &TileColumns::Uniform(columns))
                        .unwrap();

                assert_eq!(assignments.len(), usize::from(columns));
                assert_eq!(layout.pipe_num(), pipe_num.min(columns));
                assert_eq!(
                    layout.phase_num(),
                    columns.div_ceil(pipe_num.min(columns))
                );
                for (column, a) in assignments.iter().enumerate() {
                    assert_eq!(usize::from(layout.column(a.phase, a.pipe)), column);
                }

                let covered: u32 = assignments.iter().map(|a| a.width_in_min_cb()).sum();
                assert_eq!(covered, geometry.width_in_min_cb());
            }
        }
    }

    #[test]
    fn real_tile_explicit_columns() {
        let geometry = geometry(1920, 1080);
        let (layout, assignments) =
            partition_real_tiles(2, &geometry, &TileColumns::Explicit(vec![10, 10])).unwrap();

        assert_eq!(layout.tile_columns(), 3);
        let widths: Vec<u32> = assignments.iter().map(|a| a.width_in_min_cb()).collect();
        assert_eq!(widths, vec![80, 80, 80]);

        assert!(partition_real_tiles(2, &geometry, &TileColumns::Explicit(vec![20, 20])).is_err());
        assert!(partition_real_tiles(2, &geometry, &TileColumns::Explicit(vec![0])).is_err());
    }

    #[test]
    fn real_tile_layout_passes() {
        let layout = RealTileLayout::new(3, 7).unwrap();

        assert_eq!(layout.phase_num(), 3);
        assert_eq!(layout.pipes_in_last_phase(), 1);
        assert_eq!(layout.pipes_in_phase(0), 3);
        assert_eq!(layout.pipes_in_phase(2), 1);
        assert_eq!(layout.pipes_in_phase(3), 0);
        assert_eq!(layout.last_phase_of_pipe(0), 2);
        assert_eq!(layout.last_phase_of_pipe(2), 1);
        assert_eq!(layout.next_pass(0, 2), Some((1, 0)));
        assert_eq!(layout.next_pass(2, 0), None);
        assert!(layout.is_last_pass(2, 0));
        assert!(layout.is_last_pass_of_phase(1, 2));

        // Fewer columns than pipes.
        let layout = RealTileLayout::new(3, 2).unwrap();
        assert_eq!(layout.pipe_num(), 2);
        assert_eq!(layout.phase_num(), 1);
        assert_eq!(layout.pipes_in_last_phase(), 2);
    }

    #[test]
    fn hevc_geometry() {
        let geometry = CodingGeometry::hevc(Resolution::from((1920, 1080)), 0, 3).unwrap();
        assert_eq!(geometry.min_cb_size, 8);
        assert_eq!(geometry.max_cb_size, 64);
        assert_eq!(geometry.ctb_log2_size(), 6);
        assert_eq!(geometry.width_in_lcu(), 30);
        assert_eq!(geometry.height_in_lcu(), 17);

        assert!(CodingGeometry::hevc(Resolution::from((1920, 1080)), 0, 4).is_err());
        assert!(CodingGeometry::hevc(Resolution::from((0, 1080)), 0, 3).is_err());
    }
}
