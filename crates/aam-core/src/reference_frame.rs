//! Canonical frames that appearance is warped into.

use nalgebra::{Matrix2, Point2, Vector2};

use crate::{BooleanMask, LandmarkManager, MaskedImage, PatchShape, Shape, ShapeError};

/// Margin in pixels around the shape of a dense reference frame.
pub const DEFAULT_BOUNDARY: usize = 3;

/// Largest reference frame, in pixels, that will be allocated.
pub const MAX_FRAME_PIXELS: usize = 1 << 26;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("cannot build a reference frame from an empty shape")]
    EmptyShape,
    #[error("shape has non-finite coordinates")]
    NonFinite,
    #[error("reference frame of {width}x{height} pixels exceeds {} pixels", MAX_FRAME_PIXELS)]
    TooLarge { width: f64, height: f64 },
    #[error("patch shape must be non-empty, got {height}x{width}")]
    EmptyPatch { height: usize, width: usize },
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Mask plus the frame's own landmark layout.
///
/// The `"source"` group holds the shape as placed inside the frame; it is
/// the source side of the warp into the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceFrame {
    pub mask: BooleanMask,
    pub landmarks: LandmarkManager,
}

impl ReferenceFrame {
    #[inline]
    pub fn width(&self) -> usize {
        self.mask.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.mask.height
    }

    #[inline]
    pub fn source(&self) -> Option<&Shape> {
        self.landmarks.source()
    }

    /// Zero image over the frame mask with the frame landmarks attached.
    pub fn blank_image(&self, n_channels: usize) -> MaskedImage {
        let mut img = MaskedImage::blank(self.mask.clone(), n_channels);
        img.landmarks = self.landmarks.clone();
        img
    }
}

// Shift `shape` so its minimum corner sits at (boundary, boundary) and size
// the canvas to contain it plus the same margin on the far side.
fn place(shape: &Shape, boundary: f64) -> Result<(Shape, usize, usize), FrameError> {
    let (min, max) = shape.bounds().ok_or(FrameError::EmptyShape)?;
    if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
        return Err(FrameError::NonFinite);
    }
    let width = ((max.x - min.x) + boundary).ceil() + boundary + 1.0;
    let height = ((max.y - min.y) + boundary).ceil() + boundary + 1.0;
    if !(width.is_finite() && height.is_finite()) || width * height > MAX_FRAME_PIXELS as f64 {
        return Err(FrameError::TooLarge { width, height });
    }
    let offset = Vector2::new(boundary - min.x, boundary - min.y);
    let placed = shape.translated(offset);
    Ok((placed, width as usize, height as usize))
}

fn rasterize_triangles(
    points: &[Point2<f64>],
    trilist: &[[usize; 3]],
    mask: &mut BooleanMask,
) {
    const EPS: f64 = 1e-9;
    for &[i, j, k] in trilist {
        let (a, b, c) = (points[i], points[j], points[k]);
        let Some(inv) = Matrix2::from_columns(&[b - a, c - a]).try_inverse() else {
            continue;
        };
        let x0 = a.x.min(b.x).min(c.x).floor().max(0.0) as usize;
        let y0 = a.y.min(b.y).min(c.y).floor().max(0.0) as usize;
        let x1 = (a.x.max(b.x).max(c.x).ceil() as usize).min(mask.width.saturating_sub(1));
        let y1 = (a.y.max(b.y).max(c.y).ceil() as usize).min(mask.height.saturating_sub(1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                let bc = inv * (Point2::new(x as f64, y as f64) - a);
                if bc.x >= -EPS && bc.y >= -EPS && bc.x + bc.y <= 1.0 + EPS {
                    mask.set(x, y, true);
                }
            }
        }
    }
}

/// Dense reference frame around `shape`.
///
/// With a triangle list the mask is the union of the triangles and the
/// frame landmarks are a mesh; without one the mask covers the whole frame
/// and the landmarks are a plain point cloud.
pub fn build_reference_frame(
    shape: &Shape,
    trilist: Option<&[[usize; 3]]>,
    boundary: usize,
) -> Result<ReferenceFrame, FrameError> {
    let (placed, width, height) = place(shape, boundary as f64)?;
    let points = placed.points().to_vec();

    let (mask, frame_shape) = match trilist {
        Some(trilist) => {
            let frame_shape = Shape::tri_mesh(points, trilist.to_vec())?;
            let mut mask = BooleanMask::all_false(width, height);
            rasterize_triangles(frame_shape.points(), trilist, &mut mask);
            (mask, frame_shape)
        }
        None => (
            BooleanMask::all_true(width, height),
            Shape::point_cloud(points),
        ),
    };

    log::debug!(
        "reference frame {}x{} ({} masked px, {} landmarks, triangulated: {})",
        width,
        height,
        mask.n_true(),
        frame_shape.n_points(),
        frame_shape.is_tri_mesh()
    );

    Ok(ReferenceFrame {
        mask,
        landmarks: LandmarkManager::with_source(frame_shape),
    })
}

/// Reference frame made of one `patch_shape` patch centred on every
/// landmark. Any triangulation on `shape` is ignored.
pub fn build_patch_reference_frame(
    shape: &Shape,
    patch_shape: PatchShape,
) -> Result<ReferenceFrame, FrameError> {
    if patch_shape.is_empty() {
        return Err(FrameError::EmptyPatch {
            height: patch_shape.height,
            width: patch_shape.width,
        });
    }
    let boundary = patch_shape.height.max(patch_shape.width).div_ceil(2);
    let (placed, width, height) = place(&shape.to_point_cloud(), boundary as f64)?;

    let mut mask = BooleanMask::all_false(width, height);
    let half_w = patch_shape.width as f64 / 2.0;
    let half_h = patch_shape.height as f64 / 2.0;
    for p in placed.points() {
        let x0 = (p.x - half_w).round().max(0.0) as usize;
        let y0 = (p.y - half_h).round().max(0.0) as usize;
        for y in y0..(y0 + patch_shape.height).min(height) {
            for x in x0..(x0 + patch_shape.width).min(width) {
                mask.set(x, y, true);
            }
        }
    }

    log::debug!(
        "patch reference frame {}x{} ({} patches of {}x{})",
        width,
        height,
        placed.n_points(),
        patch_shape.height,
        patch_shape.width
    );

    Ok(ReferenceFrame {
        mask,
        landmarks: LandmarkManager::with_source(placed),
    })
}
