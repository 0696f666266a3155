use nalgebra::{DVector, Point2};
use serde::{Deserialize, Serialize};

use crate::pca::{Vectorizable, VectorizeError};
use crate::transform::Transform;
use crate::LandmarkManager;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("buffer dimensions {0:?} overflow")]
    Overflow(Vec<usize>),
    #[error("expected {expected} values, got {actual}")]
    BufferLength { expected: usize, actual: usize },
    #[error("mask is {mask_width}x{mask_height}, image is {width}x{height}")]
    MaskMismatch {
        width: usize,
        height: usize,
        mask_width: usize,
        mask_height: usize,
    },
}

/// Checked product of buffer dimensions.
pub(crate) fn buffer_len(dims: &[usize]) -> Result<usize, ImageError> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| ImageError::Overflow(dims.to_vec()))
}

pub(crate) fn check_buffer_len(dims: &[usize], actual: usize) -> Result<(), ImageError> {
    let expected = buffer_len(dims)?;
    if expected != actual {
        return Err(ImageError::BufferLength { expected, actual });
    }
    Ok(())
}

/// Dense multi-channel `f64` image.
///
/// Pixels are row-major with interleaved channels; pixel `(x, y)` sits at
/// integer coordinates `(x, y)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawImage")]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub n_channels: usize,
    pub pixels: Vec<f64>, // len = w*h*c
}

#[derive(Deserialize)]
struct RawImage {
    width: usize,
    height: usize,
    n_channels: usize,
    pixels: Vec<f64>,
}

impl TryFrom<RawImage> for Image {
    type Error = ImageError;

    fn try_from(raw: RawImage) -> Result<Self, Self::Error> {
        check_buffer_len(&[raw.width, raw.height, raw.n_channels], raw.pixels.len())?;
        Ok(Self {
            width: raw.width,
            height: raw.height,
            n_channels: raw.n_channels,
            pixels: raw.pixels,
        })
    }
}

impl Image {
    pub fn zeros(width: usize, height: usize, n_channels: usize) -> Self {
        Self {
            width,
            height,
            n_channels,
            pixels: vec![0.0; width * height * n_channels],
        }
    }

    /// Single-channel image from a per-pixel function.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            n_channels: 1,
            pixels,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f64] {
        let start = (y * self.width + x) * self.n_channels;
        &self.pixels[start..start + self.n_channels]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [f64] {
        let start = (y * self.width + x) * self.n_channels;
        &mut self.pixels[start..start + self.n_channels]
    }

    #[inline]
    fn get(&self, x: i64, y: i64, c: usize) -> f64 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0.0;
        }
        self.pixels[(y as usize * self.width + x as usize) * self.n_channels + c]
    }

    /// Bilinear sample of every channel into `out`; outside pixels read as 0.
    pub fn sample_bilinear(&self, x: f64, y: f64, out: &mut [f64]) {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        for (c, o) in out.iter_mut().enumerate().take(self.n_channels) {
            let p00 = self.get(x0, y0, c);
            let p10 = self.get(x0 + 1, y0, c);
            let p01 = self.get(x0, y0 + 1, c);
            let p11 = self.get(x0 + 1, y0 + 1, c);

            let a = p00 + fx * (p10 - p00);
            let b = p01 + fx * (p11 - p01);
            *o = a + fy * (b - a);
        }
    }
}

/// Per-pixel validity mask.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBooleanMask")]
pub struct BooleanMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>, // row-major, len = w*h
}

#[derive(Deserialize)]
struct RawBooleanMask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl TryFrom<RawBooleanMask> for BooleanMask {
    type Error = ImageError;

    fn try_from(raw: RawBooleanMask) -> Result<Self, Self::Error> {
        check_buffer_len(&[raw.width, raw.height], raw.data.len())?;
        Ok(Self {
            width: raw.width,
            height: raw.height,
            data: raw.data,
        })
    }
}

impl BooleanMask {
    pub fn all_true(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![true; width * height],
        }
    }

    pub fn all_false(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        self.data[y * self.width + x] = value;
    }

    pub fn n_true(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }

    /// `(x, y)` of every true pixel, row-major.
    pub fn true_pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(|(i, _)| (i % self.width, i / self.width))
    }
}

/// An image restricted to a mask, with landmarks attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMaskedImage")]
pub struct MaskedImage {
    pub image: Image,
    pub mask: BooleanMask,
    #[serde(default)]
    pub landmarks: LandmarkManager,
}

#[derive(Deserialize)]
struct RawMaskedImage {
    image: Image,
    mask: BooleanMask,
    #[serde(default)]
    landmarks: LandmarkManager,
}

impl TryFrom<RawMaskedImage> for MaskedImage {
    type Error = ImageError;

    fn try_from(raw: RawMaskedImage) -> Result<Self, Self::Error> {
        let (image, mask) = (raw.image, raw.mask);
        if (image.width, image.height) != (mask.width, mask.height) {
            return Err(ImageError::MaskMismatch {
                width: image.width,
                height: image.height,
                mask_width: mask.width,
                mask_height: mask.height,
            });
        }
        Ok(Self {
            image,
            mask,
            landmarks: raw.landmarks,
        })
    }
}

impl MaskedImage {
    /// Zero image covering `mask`.
    pub fn blank(mask: BooleanMask, n_channels: usize) -> Self {
        Self {
            image: Image::zeros(mask.width, mask.height, n_channels),
            mask,
            landmarks: LandmarkManager::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.image.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.image.height
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.image.n_channels
    }

    /// Set every channel of every masked pixel to `value`.
    pub fn fill_masked(&mut self, value: f64) {
        let n_channels = self.image.n_channels;
        for (x, y) in self.mask.true_pixels() {
            let start = (y * self.image.width + x) * n_channels;
            self.image.pixels[start..start + n_channels].fill(value);
        }
    }

    /// Sample this image at `transform(p)` for every true pixel `p` of
    /// `mask`.
    ///
    /// The result has the extent of `mask` and carries no landmarks. Pixels
    /// the transform cannot map stay 0 but remain inside the mask.
    pub fn warp_to_mask(&self, mask: &BooleanMask, transform: &dyn Transform) -> MaskedImage {
        let mut out = MaskedImage::blank(mask.clone(), self.n_channels());
        let mut unmapped = 0usize;
        for (x, y) in mask.true_pixels() {
            match transform.apply(Point2::new(x as f64, y as f64)) {
                Some(p) => self.image.sample_bilinear(p.x, p.y, out.image.pixel_mut(x, y)),
                None => unmapped += 1,
            }
        }
        if unmapped > 0 {
            log::trace!(
                "warp_to_mask: {unmapped} of {} pixels outside the transform domain",
                mask.n_true()
            );
        }
        out
    }
}

impl Vectorizable for MaskedImage {
    fn n_parameters(&self) -> usize {
        self.mask.n_true() * self.n_channels()
    }

    fn as_vector(&self) -> DVector<f64> {
        let n_channels = self.n_channels();
        let mut v = Vec::with_capacity(self.n_parameters());
        for (x, y) in self.mask.true_pixels() {
            v.extend_from_slice(self.image.pixel(x, y));
        }
        debug_assert_eq!(v.len(), self.mask.n_true() * n_channels);
        DVector::from_vec(v)
    }

    fn from_vector(&self, v: &DVector<f64>) -> Result<Self, VectorizeError> {
        let expected = self.n_parameters();
        if v.len() != expected {
            return Err(VectorizeError::LengthMismatch {
                expected,
                actual: v.len(),
            });
        }
        let n_channels = self.n_channels();
        let mut out = MaskedImage {
            image: Image::zeros(self.width(), self.height(), n_channels),
            mask: self.mask.clone(),
            landmarks: self.landmarks.clone(),
        };
        for ((x, y), values) in self.mask.true_pixels().zip(v.as_slice().chunks_exact(n_channels)) {
            out.image.pixel_mut(x, y).copy_from_slice(values);
        }
        Ok(out)
    }
}
