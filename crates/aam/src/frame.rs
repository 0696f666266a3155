//! Per-variant reference frame construction.

use aam_core::{
    build_patch_reference_frame, build_reference_frame, PatchShape, ReferenceFrame, Shape,
    DEFAULT_BOUNDARY,
};

use crate::error::{AamError, Result};
use crate::model::{Aam, AamKind};

impl Aam {
    /// `"source"` landmarks of the appearance template at a resolved level.
    pub(crate) fn template_landmarks(&self, level: usize) -> Result<&Shape> {
        self.appearance_models[level]
            .mean()
            .landmarks()
            .source()
            .ok_or_else(|| {
                AamError::InconsistentModel(format!(
                    "appearance template of level {level} has no source landmarks"
                ))
            })
    }

    /// Reference frame the appearance of `shape_instance` is warped into.
    pub fn build_frame(&self, level: isize, shape_instance: &Shape) -> Result<ReferenceFrame> {
        let idx = self.resolve_level(level)?;
        self.frame_at(idx, shape_instance)
    }

    pub(crate) fn frame_at(&self, level: usize, shape_instance: &Shape) -> Result<ReferenceFrame> {
        let patch_shape: Option<PatchShape> = match self.kind {
            AamKind::Global { .. } => None,
            AamKind::Patch { patch_shape } => Some(patch_shape),
            AamKind::Parts { parts_shape } => Some(parts_shape),
            AamKind::LinearGlobal { .. } | AamKind::LinearPatch { .. } => {
                return Err(AamError::UnsupportedOperation {
                    operation: "build_frame",
                    variant: self.kind.name(),
                });
            }
        };

        // Frame landmarks are the instance's points, so this is also the
        // frame-vs-template check.
        let template = self.template_landmarks(level)?;
        if template.n_points() != shape_instance.n_points() {
            return Err(AamError::GeometryMismatch(format!(
                "shape instance has {} points, appearance template of level {level} has {}",
                shape_instance.n_points(),
                template.n_points()
            )));
        }

        let frame = match patch_shape {
            Some(ps) => build_patch_reference_frame(shape_instance, ps)?,
            None => {
                // The template's triangulation wins; with none anywhere the
                // frame is the plain bounding box.
                let trilist = template.trilist().or_else(|| shape_instance.trilist());
                if trilist.is_none() {
                    log::debug!(
                        "level {level}: no triangulation on template or instance, using untriangulated frame"
                    );
                }
                build_reference_frame(shape_instance, trilist, DEFAULT_BOUNDARY)?
            }
        };
        Ok(frame)
    }
}
