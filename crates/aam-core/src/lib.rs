//! Geometry and image primitives for active appearance model synthesis.
//!
//! This crate holds the pieces an AAM is assembled from: landmark shapes,
//! masked images, linear subspace models, point warps and reference frames.
//! It knows nothing about model variants; those live in the `aam` crate.

mod image;
mod landmarks;
mod logger;
mod parts;
mod pca;
mod reference_frame;
mod shape;
mod transform;

pub use image::{BooleanMask, Image, ImageError, MaskedImage};
pub use landmarks::{LandmarkManager, SOURCE_GROUP};
pub use parts::{PartsImage, PatchShape};
pub use pca::{PcaError, PcaModel, Vectorizable, VectorizeError};
pub use reference_frame::{
    build_patch_reference_frame, build_reference_frame, FrameError, ReferenceFrame,
    DEFAULT_BOUNDARY, MAX_FRAME_PIXELS,
};
pub use shape::{PointCloud, Shape, ShapeError, TriMesh};
pub use transform::{
    PiecewiseAffine, ThinPlateSplines, Transform, TransformError, TransformKind, TRANSFORM_MODULE,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

pub use nalgebra::Point2;
