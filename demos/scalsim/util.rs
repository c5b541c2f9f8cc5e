// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use argh::FromArgs;
use cros_scalability::scalability::partition::SplitPolicy;
use cros_scalability::Codec;
use cros_scalability::SurfaceFormat;

/// Plans the multi-pipe decoding of one frame and runs it on simulated engines
#[derive(Debug, FromArgs)]
pub struct Args {
    /// width of the frame, in pixels
    #[argh(option)]
    pub width: u32,

    /// height of the frame, in pixels
    #[argh(option)]
    pub height: u32,

    /// codec of the stream (hevc or vp9). Default: hevc
    #[argh(option, default = "Codec::Hevc")]
    pub codec: Codec,

    /// surface format the frame decodes into. Default: nv12
    #[argh(option, default = "SurfaceFormat::NV12")]
    pub format: SurfaceFormat,

    /// number of video decode engines. Default: 2
    #[argh(option, default = "2")]
    pub vdbox: u8,

    /// number of uniformly spaced tile columns, enables real tile decoding
    #[argh(option)]
    pub tile_columns: Option<u8>,

    /// whether to submit the front end separately. Default: only with more than 2 engines
    #[argh(option)]
    pub fe_separate: Option<bool>,

    /// how to split the picture between pipes (even or first-column-aligned). Default: even
    #[argh(option, default = "SplitPolicy::Even")]
    pub split: SplitPolicy,

    /// submit each real tile phase on its own
    #[argh(switch)]
    pub phased: bool,

    /// slice data is in short format
    #[argh(switch)]
    pub short_format: bool,

    /// size the engines report for the CABAC streamout, to simulate an overflow
    #[argh(option, default = "0")]
    pub streamout_size: u32,
}
