use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::image::{check_buffer_len, ImageError};
use crate::pca::{Vectorizable, VectorizeError};
use crate::LandmarkManager;

/// Extent of a patch in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchShape {
    pub height: usize,
    pub width: usize,
}

impl PatchShape {
    pub const fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    #[inline]
    pub fn n_pixels(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

/// Appearance kept as one fixed-size patch per landmark.
///
/// `patches` is laid out part-major, then row-major, then channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPartsImage")]
pub struct PartsImage {
    pub patch_shape: PatchShape,
    pub n_parts: usize,
    pub n_channels: usize,
    pub patches: Vec<f64>,
    #[serde(default)]
    pub landmarks: LandmarkManager,
}

#[derive(Deserialize)]
struct RawPartsImage {
    patch_shape: PatchShape,
    n_parts: usize,
    n_channels: usize,
    patches: Vec<f64>,
    #[serde(default)]
    landmarks: LandmarkManager,
}

impl TryFrom<RawPartsImage> for PartsImage {
    type Error = ImageError;

    fn try_from(raw: RawPartsImage) -> Result<Self, Self::Error> {
        check_buffer_len(
            &[
                raw.n_parts,
                raw.patch_shape.height,
                raw.patch_shape.width,
                raw.n_channels,
            ],
            raw.patches.len(),
        )?;
        Ok(Self {
            patch_shape: raw.patch_shape,
            n_parts: raw.n_parts,
            n_channels: raw.n_channels,
            patches: raw.patches,
            landmarks: raw.landmarks,
        })
    }
}

impl PartsImage {
    pub fn zeros(n_parts: usize, patch_shape: PatchShape, n_channels: usize) -> Self {
        Self {
            patch_shape,
            n_parts,
            n_channels,
            patches: vec![0.0; n_parts * patch_shape.n_pixels() * n_channels],
            landmarks: LandmarkManager::new(),
        }
    }

    #[inline]
    fn part_len(&self) -> usize {
        self.patch_shape.n_pixels() * self.n_channels
    }

    /// Pixels of one part, `None` past the last part.
    pub fn part(&self, index: usize) -> Option<&[f64]> {
        if index >= self.n_parts {
            return None;
        }
        let len = self.part_len();
        Some(&self.patches[index * len..(index + 1) * len])
    }

    pub fn part_mut(&mut self, index: usize) -> Option<&mut [f64]> {
        if index >= self.n_parts {
            return None;
        }
        let len = self.part_len();
        Some(&mut self.patches[index * len..(index + 1) * len])
    }
}

impl Vectorizable for PartsImage {
    fn n_parameters(&self) -> usize {
        self.patches.len()
    }

    fn as_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.patches)
    }

    fn from_vector(&self, v: &DVector<f64>) -> Result<Self, VectorizeError> {
        if v.len() != self.patches.len() {
            return Err(VectorizeError::LengthMismatch {
                expected: self.patches.len(),
                actual: v.len(),
            });
        }
        Ok(Self {
            patches: v.as_slice().to_vec(),
            ..self.clone()
        })
    }
}
