// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Multi-pipe decode scalability.
//!
//! A large picture can be decoded by several hardware decode engines ("pipes") running in
//! parallel. The [`scalability`] module decides how many pipes a frame uses, splits the picture
//! between them, sequences the phases each pipe runs and inserts the synchronization primitives
//! that make the pipes rendezvous. The hardware command layer is abstracted by the traits of the
//! [`backend`] module.

pub mod backend;
pub mod scalability;

use std::str::FromStr;

use enumn::N;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Number of pixels covered by this resolution.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether this resolution has at least one null dimension.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if `self` is at least as large as `(width, height)` in both dimensions.
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.width >= width && self.height >= height
    }
}

impl From<(u32, u32)> for Resolution {
    fn from(value: (u32, u32)) -> Self {
        Self {
            width: value.0,
            height: value.1,
        }
    }
}

/// Codecs for which scalable decoding is supported.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Codec {
    #[default]
    Hevc,
    Vp9,
}

impl FromStr for Codec {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hevc" | "HEVC" | "h265" | "H265" => Ok(Codec::Hevc),
            "vp9" | "VP9" => Ok(Codec::Vp9),
            _ => Err("unrecognized codec. Valid values: hevc, vp9"),
        }
    }
}

/// Chroma subsampling, numbered like the HEVC `chroma_format_idc` syntax element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum ChromaFormat {
    Monochrome = 0,
    Yuv420 = 1,
    Yuv422 = 2,
    Yuv444 = 3,
}

/// Decoded surface formats, as far as the pipe-count decision is concerned.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    #[default]
    NV12,
    P010,
    P016,
    YUY2,
    Y210,
    Y216,
    AYUV,
    Y410,
    Y416,
}

impl SurfaceFormat {
    /// Returns the surface format a stream with `chroma_format_idc` and `bit_depth` decodes into,
    /// or `None` if no such format exists.
    pub fn from_stream_params(chroma_format_idc: u32, bit_depth: u8) -> Option<Self> {
        let format = match (ChromaFormat::n(chroma_format_idc)?, bit_depth) {
            (ChromaFormat::Monochrome | ChromaFormat::Yuv420, 8) => SurfaceFormat::NV12,
            (ChromaFormat::Monochrome | ChromaFormat::Yuv420, 10) => SurfaceFormat::P010,
            (ChromaFormat::Monochrome | ChromaFormat::Yuv420, 12) => SurfaceFormat::P016,
            (ChromaFormat::Yuv422, 8) => SurfaceFormat::YUY2,
            (ChromaFormat::Yuv422, 10) => SurfaceFormat::Y210,
            (ChromaFormat::Yuv422, 12) => SurfaceFormat::Y216,
            (ChromaFormat::Yuv444, 8) => SurfaceFormat::AYUV,
            (ChromaFormat::Yuv444, 10) => SurfaceFormat::Y410,
            (ChromaFormat::Yuv444, 12) => SurfaceFormat::Y416,
            _ => return None,
        };

        Some(format)
    }

    /// Whether this is one of the 4:2:0 formats of 10 bits or less.
    ///
    /// Every other format is a range extension format, which puts more pressure on a single pipe
    /// and thus switches to multiple pipes at smaller resolutions.
    pub fn is_standard(&self) -> bool {
        matches!(self, SurfaceFormat::NV12 | SurfaceFormat::P010)
    }

    pub fn chroma_format(&self) -> ChromaFormat {
        match self {
            SurfaceFormat::NV12 | SurfaceFormat::P010 | SurfaceFormat::P016 => ChromaFormat::Yuv420,
            SurfaceFormat::YUY2 | SurfaceFormat::Y210 | SurfaceFormat::Y216 => ChromaFormat::Yuv422,
            SurfaceFormat::AYUV | SurfaceFormat::Y410 | SurfaceFormat::Y416 => ChromaFormat::Yuv444,
        }
    }

    pub fn bit_depth(&self) -> u8 {
        match self {
            SurfaceFormat::NV12 | SurfaceFormat::YUY2 | SurfaceFormat::AYUV => 8,
            SurfaceFormat::P010 | SurfaceFormat::Y210 | SurfaceFormat::Y410 => 10,
            SurfaceFormat::P016 | SurfaceFormat::Y216 | SurfaceFormat::Y416 => 12,
        }
    }
}

impl FromStr for SurfaceFormat {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nv12" | "NV12" => Ok(SurfaceFormat::NV12),
            "p010" | "P010" => Ok(SurfaceFormat::P010),
            "p016" | "P016" => Ok(SurfaceFormat::P016),
            "yuy2" | "YUY2" => Ok(SurfaceFormat::YUY2),
            "y210" | "Y210" => Ok(SurfaceFormat::Y210),
            "y216" | "Y216" => Ok(SurfaceFormat::Y216),
            "ayuv" | "AYUV" => Ok(SurfaceFormat::AYUV),
            "y410" | "Y410" => Ok(SurfaceFormat::Y410),
            "y416" | "Y416" => Ok(SurfaceFormat::Y416),
            _ => Err("unrecognized surface format. Valid values: nv12, p010, p016, yuy2, y210, y216, ayuv, y410, y416"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_from_stream_params() {
        assert_eq!(SurfaceFormat::from_stream_params(1, 8), Some(SurfaceFormat::NV12));
        assert_eq!(SurfaceFormat::from_stream_params(1, 10), Some(SurfaceFormat::P010));
        assert_eq!(SurfaceFormat::from_stream_params(2, 10), Some(SurfaceFormat::Y210));
        assert_eq!(SurfaceFormat::from_stream_params(3, 12), Some(SurfaceFormat::Y416));
        assert_eq!(SurfaceFormat::from_stream_params(4, 8), None);
        assert_eq!(SurfaceFormat::from_stream_params(1, 9), None);
    }

    #[test]
    fn standard_formats() {
        for format in [SurfaceFormat::NV12, SurfaceFormat::P010] {
            assert!(format.is_standard());
            assert_eq!(format.chroma_format(), ChromaFormat::Yuv420);
        }

        for format in [SurfaceFormat::P016, SurfaceFormat::Y210, SurfaceFormat::AYUV] {
            assert!(!format.is_standard());
        }
    }

    #[test]
    fn resolution_area() {
        let res = Resolution::from((7680, 4320));
        assert_eq!(res.area(), 33_177_600);
        assert!(res.covers(3840, 2160));
        assert!(!res.covers(8192, 16));
        assert!(Resolution::from((0, 16)).is_empty());
    }
}
