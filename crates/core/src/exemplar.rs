// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Exemplars: the type and shape descriptors carried by pads.
//!
//! An exemplar is used twice: at link time to check that two pads can share
//! data, and at verify time to size the pad's buffer pool.
//!
//! ## Compatibility
//!
//! Two exemplars are compatible when their kind and descriptor match exactly and
//! their channel counts agree. A channel count of `0` is a wildcard that matches
//! any count; it is resolved during verification from the upstream node (this is
//! how a sensor's channel count reaches every node downstream of it).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::error::{FrameKitError, Result};

/// Wildcard channel count, resolved at verify time.
pub const ANY_CHANNELS: u32 = 0;

/// Pixel layout of an image plane set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    U8,
    U16,
    S16,
    Rgb,
    Rgbx,
    Nv12,
    Yuyv,
    Uyvy,
}

impl ImageFormat {
    /// Bytes needed to hold one `width x height` image in this format.
    pub const fn frame_bytes(self, width: usize, height: usize) -> usize {
        match self {
            Self::U8 => width * height,
            Self::U16 | Self::S16 | Self::Yuyv | Self::Uyvy => width * height * 2,
            Self::Rgb => width * height * 3,
            Self::Rgbx => width * height * 4,
            // Full-resolution luma plus interleaved half-resolution chroma.
            Self::Nv12 => width * height + width.div_ceil(2) * height.div_ceil(2) * 2,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::S16 => "s16",
            Self::Rgb => "rgb",
            Self::Rgbx => "rgbx",
            Self::Nv12 => "nv12",
            Self::Yuyv => "yuyv",
            Self::Uyvy => "uyvy",
        }
    }
}

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F16,
    F32,
}

impl DataType {
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }
}

/// Scale factor between consecutive pyramid levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PyramidScale {
    /// Each level is half the size of the previous one.
    Half,
    /// Each level is `2^-0.25` of the previous one.
    Orb,
}

impl PyramidScale {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn level_size(self, base: usize, level: u32) -> usize {
        match self {
            Self::Half => base.div_ceil(1usize.checked_shl(level).unwrap_or(usize::MAX)).max(1),
            Self::Orb => {
                let factor = 0.840_896_415_253_714_5_f64.powi(level.cast_signed());
                ((base as f64) * factor).ceil().max(1.0) as usize
            },
        }
    }
}

/// The bare kind tag of an exemplar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemplarKind {
    Image,
    Tensor,
    Pyramid,
    Array,
    Distribution,
}

impl fmt::Display for ExemplarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Image => "image",
            Self::Tensor => "tensor",
            Self::Pyramid => "pyramid",
            Self::Array => "array",
            Self::Distribution => "distribution",
        };
        f.write_str(label)
    }
}

/// Shape of a single channel's data block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataDesc {
    Image { width: u32, height: u32, format: ImageFormat },
    Tensor { dims: SmallVec<[usize; 4]>, data_type: DataType },
    Pyramid { levels: u32, scale: PyramidScale, width: u32, height: u32, format: ImageFormat },
    Array { item_size: usize, capacity: usize },
    Distribution { bins: u32, offset: i32, range: u32 },
}

impl DataDesc {
    pub const fn kind(&self) -> ExemplarKind {
        match self {
            Self::Image { .. } => ExemplarKind::Image,
            Self::Tensor { .. } => ExemplarKind::Tensor,
            Self::Pyramid { .. } => ExemplarKind::Pyramid,
            Self::Array { .. } => ExemplarKind::Array,
            Self::Distribution { .. } => ExemplarKind::Distribution,
        }
    }

    /// Bytes needed for one channel of this shape.
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Image { width, height, format } => {
                format.frame_bytes(*width as usize, *height as usize)
            },
            Self::Tensor { dims, data_type } => {
                if dims.is_empty() {
                    0
                } else {
                    dims.iter().product::<usize>() * data_type.size()
                }
            },
            Self::Pyramid { levels, scale, width, height, format } => (0..*levels)
                .map(|level| {
                    format.frame_bytes(
                        scale.level_size(*width as usize, level),
                        scale.level_size(*height as usize, level),
                    )
                })
                .sum(),
            Self::Array { item_size, capacity } => item_size * capacity,
            Self::Distribution { bins, .. } => *bins as usize * std::mem::size_of::<u32>(),
        }
    }
}

impl fmt::Display for DataDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image { width, height, format } => {
                write!(f, "image {width}x{height} {}", format.label())
            },
            Self::Tensor { dims, data_type } => write!(f, "tensor {dims:?} {data_type:?}"),
            Self::Pyramid { levels, scale, width, height, format } => write!(
                f,
                "pyramid {levels}x{scale:?} {width}x{height} {}",
                format.label()
            ),
            Self::Array { item_size, capacity } => write!(f, "array {capacity}x{item_size}B"),
            Self::Distribution { bins, offset, range } => {
                write!(f, "distribution {bins} bins [{offset}, +{range})")
            },
        }
    }
}

/// Type descriptor of a pad: one data block shape replicated over `channels`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exemplar {
    pub desc: DataDesc,
    /// Number of channels (object array length). `0` means "inherit".
    #[serde(default)]
    pub channels: u32,
}

impl Exemplar {
    pub const fn new(desc: DataDesc, channels: u32) -> Self {
        Self { desc, channels }
    }

    pub const fn image(width: u32, height: u32, format: ImageFormat) -> Self {
        Self::new(DataDesc::Image { width, height, format }, 1)
    }

    pub fn tensor(dims: &[usize], data_type: DataType) -> Self {
        Self::new(DataDesc::Tensor { dims: SmallVec::from_slice(dims), data_type }, 1)
    }

    pub const fn pyramid(
        levels: u32,
        scale: PyramidScale,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Self {
        Self::new(DataDesc::Pyramid { levels, scale, width, height, format }, 1)
    }

    pub const fn array(item_size: usize, capacity: usize) -> Self {
        Self::new(DataDesc::Array { item_size, capacity }, 1)
    }

    pub const fn distribution(bins: u32, offset: i32, range: u32) -> Self {
        Self::new(DataDesc::Distribution { bins, offset, range }, 1)
    }

    /// Returns a copy with the given channel count.
    #[must_use]
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    pub const fn kind(&self) -> ExemplarKind {
        self.desc.kind()
    }

    /// `false` while the channel count is still the wildcard.
    pub const fn is_resolved(&self) -> bool {
        self.channels != ANY_CHANNELS
    }

    pub fn channel_bytes(&self) -> usize {
        self.desc.byte_size()
    }

    pub fn total_bytes(&self) -> usize {
        self.channel_bytes() * self.channels as usize
    }

    /// Merges two exemplars that are about to share a pool.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] when kinds, descriptors or
    /// non-wildcard channel counts differ.
    pub fn unify(&self, other: &Self) -> Result<Self> {
        if self.kind() != other.kind() {
            return Err(FrameKitError::Configuration(format!(
                "exemplar kind mismatch: {} vs {}",
                self.kind(),
                other.kind()
            )));
        }
        if self.desc != other.desc {
            return Err(FrameKitError::Configuration(format!(
                "exemplar shape mismatch: {} vs {}",
                self.desc, other.desc
            )));
        }
        let channels = match (self.channels, other.channels) {
            (ANY_CHANNELS, c) | (c, ANY_CHANNELS) => c,
            (a, b) if a == b => a,
            (a, b) => {
                return Err(FrameKitError::Configuration(format!(
                    "channel count mismatch: {a} vs {b}"
                )));
            },
        };
        Ok(Self { desc: self.desc.clone(), channels })
    }
}

/// Checks whether two exemplars may be linked.
pub fn can_link(a: &Exemplar, b: &Exemplar) -> bool {
    a.unify(b).is_ok()
}

impl fmt::Display for Exemplar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            write!(f, "{} x{}", self.desc, self.channels)
        } else {
            write!(f, "{} x*", self.desc)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_sizes() {
        assert_eq!(ImageFormat::U8.frame_bytes(4, 4), 16);
        assert_eq!(ImageFormat::Rgb.frame_bytes(4, 4), 48);
        assert_eq!(ImageFormat::Nv12.frame_bytes(4, 4), 24);
        assert_eq!(ImageFormat::Nv12.frame_bytes(3, 3), 9 + 8);
    }

    #[test]
    fn test_pyramid_half_levels() {
        let ex = Exemplar::pyramid(3, PyramidScale::Half, 8, 8, ImageFormat::U8);
        assert_eq!(ex.channel_bytes(), 64 + 16 + 4);
    }

    #[test]
    fn test_tensor_and_distribution_sizes() {
        assert_eq!(Exemplar::tensor(&[2, 3, 4], DataType::F32).channel_bytes(), 96);
        assert_eq!(Exemplar::distribution(16, 0, 256).channel_bytes(), 64);
        assert_eq!(Exemplar::array(8, 10).with_channels(3).total_bytes(), 240);
    }

    #[test]
    fn test_unify_fills_wildcard() {
        let a = Exemplar::image(64, 48, ImageFormat::Nv12).with_channels(ANY_CHANNELS);
        let b = Exemplar::image(64, 48, ImageFormat::Nv12).with_channels(4);
        assert_eq!(a.unify(&b).unwrap().channels, 4);
        assert_eq!(b.unify(&a).unwrap().channels, 4);
    }

    #[test]
    fn test_unify_rejects_mismatches() {
        let img = Exemplar::image(64, 48, ImageFormat::Nv12);
        assert!(!can_link(&img, &Exemplar::tensor(&[64, 48], DataType::U8)));
        assert!(!can_link(&img, &Exemplar::image(64, 32, ImageFormat::Nv12)));
        assert!(!can_link(&img, &Exemplar::image(64, 48, ImageFormat::U8)));
        assert!(!can_link(&img, &img.clone().with_channels(2)));
    }

    #[test]
    fn test_exemplar_from_yaml() {
        let ex: Exemplar = serde_saphyr::from_str(
            "desc:\n  kind: image\n  width: 1920\n  height: 1080\n  format: nv12\nchannels: 2\n",
        )
        .unwrap();
        assert_eq!(ex, Exemplar::image(1920, 1080, ImageFormat::Nv12).with_channels(2));
    }
}
