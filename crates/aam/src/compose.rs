//! Turning a shape instance and an appearance instance into an image.

use aam_core::{LandmarkManager, MaskedImage, PartsImage, Shape};

use crate::error::{AamError, Result};
use crate::model::{Aam, Appearance};

/// A synthesized model instance.
#[derive(Clone, Debug, PartialEq)]
pub enum AamInstance {
    /// Appearance warped into the instance's reference frame.
    Image(MaskedImage),
    /// Per-landmark parts with the instance landmarks attached.
    Parts(PartsImage),
}

impl AamInstance {
    pub fn landmarks(&self) -> &LandmarkManager {
        match self {
            AamInstance::Image(img) => &img.landmarks,
            AamInstance::Parts(parts) => &parts.landmarks,
        }
    }

    /// Frame geometry the instance was synthesized into.
    pub fn source(&self) -> Option<&Shape> {
        self.landmarks().source()
    }

    pub fn as_image(&self) -> Option<&MaskedImage> {
        match self {
            AamInstance::Image(img) => Some(img),
            AamInstance::Parts(_) => None,
        }
    }

    pub fn as_parts(&self) -> Option<&PartsImage> {
        match self {
            AamInstance::Image(_) => None,
            AamInstance::Parts(parts) => Some(parts),
        }
    }

    /// `(width, height)` of the image, or `(patch width, patch height)` of
    /// each part.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            AamInstance::Image(img) => (img.width(), img.height()),
            AamInstance::Parts(parts) => (parts.patch_shape.width, parts.patch_shape.height),
        }
    }
}

impl Aam {
    /// Warp `appearance_instance` into the frame of `shape_instance` at a
    /// resolved level.
    pub(crate) fn compose(
        &self,
        level: usize,
        shape_instance: &Shape,
        appearance_instance: Appearance,
    ) -> Result<AamInstance> {
        let frame = self.frame_at(level, shape_instance)?;

        match appearance_instance {
            Appearance::Parts(mut parts) => {
                if parts.n_parts != shape_instance.n_points() {
                    return Err(AamError::GeometryMismatch(format!(
                        "{} parts for a shape of {} points",
                        parts.n_parts,
                        shape_instance.n_points()
                    )));
                }
                parts.landmarks = frame.landmarks;
                Ok(AamInstance::Parts(parts))
            }
            Appearance::Dense(appearance) => {
                let transform_kind = self.kind.transform().ok_or_else(|| {
                    AamError::InconsistentModel(format!(
                        "{} variant has no transform for a dense appearance",
                        self.kind.name()
                    ))
                })?;
                let template = self.template_landmarks(level)?;
                let source = frame.source().ok_or_else(|| {
                    AamError::InconsistentModel("reference frame has no source landmarks".into())
                })?;
                let transform = transform_kind.build(source, template)?;

                let mut warped = appearance.warp_to_mask(&frame.mask, transform.as_ref());
                warped.landmarks = frame.landmarks;
                log::debug!(
                    "composed level {level} instance: {}x{}, {} masked px via {}",
                    warped.width(),
                    warped.height(),
                    warped.mask.n_true(),
                    transform_kind.name()
                );
                Ok(AamInstance::Image(warped))
            }
        }
    }
}
