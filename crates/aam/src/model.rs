//! The five AAM variants.
//!
//! All variants share one [`Aam`] struct; what differs is carried by the
//! [`AamKind`] tag and dispatched by `match` (frame building in `frame.rs`,
//! transform selection here, persisted fields in `persist.rs`).

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use aam_core::{
    MaskedImage, PartsImage, PatchShape, PcaModel, Shape, TransformKind, Vectorizable,
    VectorizeError,
};

use crate::error::{AamError, Result};
use crate::features::Features;

/// Appearance representation of a model: one dense image, or one patch per
/// landmark for the parts variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Appearance {
    Dense(MaskedImage),
    Parts(PartsImage),
}

impl Appearance {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Appearance::Dense(_) => "dense",
            Appearance::Parts(_) => "parts",
        }
    }

    pub fn landmarks(&self) -> &aam_core::LandmarkManager {
        match self {
            Appearance::Dense(img) => &img.landmarks,
            Appearance::Parts(parts) => &parts.landmarks,
        }
    }
}

impl Vectorizable for Appearance {
    fn n_parameters(&self) -> usize {
        match self {
            Appearance::Dense(img) => img.n_parameters(),
            Appearance::Parts(parts) => parts.n_parameters(),
        }
    }

    fn as_vector(&self) -> DVector<f64> {
        match self {
            Appearance::Dense(img) => img.as_vector(),
            Appearance::Parts(parts) => parts.as_vector(),
        }
    }

    fn from_vector(&self, v: &DVector<f64>) -> std::result::Result<Self, VectorizeError> {
        Ok(match self {
            Appearance::Dense(img) => Appearance::Dense(img.from_vector(v)?),
            Appearance::Parts(parts) => Appearance::Parts(parts.from_vector(v)?),
        })
    }
}

/// Variant tag with the variant-specific fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AamKind {
    /// Dense warp into a (possibly triangulated) global reference frame.
    Global { transform: TransformKind },
    /// Dense warp into a frame of patches around the landmarks.
    Patch { patch_shape: PatchShape },
    /// Reduced-dimensionality global model; does not synthesize.
    LinearGlobal {
        transform: TransformKind,
        n_landmarks: usize,
    },
    /// Reduced-dimensionality patch model; does not synthesize.
    LinearPatch {
        patch_shape: PatchShape,
        n_landmarks: usize,
    },
    /// Per-landmark parts, no dense warp.
    Parts { parts_shape: PatchShape },
}

impl AamKind {
    pub fn name(&self) -> &'static str {
        match self {
            AamKind::Global { .. } => "global",
            AamKind::Patch { .. } => "patch",
            AamKind::LinearGlobal { .. } => "linear_global",
            AamKind::LinearPatch { .. } => "linear_patch",
            AamKind::Parts { .. } => "parts",
        }
    }

    /// Warp constructor; patch variants always use thin-plate splines and
    /// the parts variant has none.
    pub fn transform(&self) -> Option<TransformKind> {
        match self {
            AamKind::Global { transform } | AamKind::LinearGlobal { transform, .. } => {
                Some(*transform)
            }
            AamKind::Patch { .. } | AamKind::LinearPatch { .. } => {
                Some(TransformKind::ThinPlateSplines)
            }
            AamKind::Parts { .. } => None,
        }
    }

    pub fn n_landmarks(&self) -> Option<usize> {
        match self {
            AamKind::LinearGlobal { n_landmarks, .. } | AamKind::LinearPatch { n_landmarks, .. } => {
                Some(*n_landmarks)
            }
            _ => None,
        }
    }

    /// Whether `instance`/`random_instance` are available.
    pub fn synthesizes(&self) -> bool {
        !matches!(
            self,
            AamKind::LinearGlobal { .. } | AamKind::LinearPatch { .. }
        )
    }

    fn uses_parts_appearance(&self) -> bool {
        matches!(self, AamKind::Parts { .. })
    }

    fn patch_shape(&self) -> Option<PatchShape> {
        match self {
            AamKind::Patch { patch_shape } | AamKind::LinearPatch { patch_shape, .. } => {
                Some(*patch_shape)
            }
            AamKind::Parts { parts_shape } => Some(*parts_shape),
            _ => None,
        }
    }
}

/// Everything a trained model is made of, independent of the variant.
#[derive(Clone, Debug)]
pub struct AamComponents {
    pub shape_models: Vec<PcaModel<Shape>>,
    pub appearance_models: Vec<PcaModel<Appearance>>,
    pub reference_shape: Shape,
    pub features: Features,
    pub sigma: Option<f64>,
    pub scales: Vec<f64>,
    pub scale_shapes: bool,
}

/// A trained active appearance model.
///
/// Immutable after construction; one shape and one appearance model per
/// pyramid level, coarsest first.
#[derive(Clone, Debug)]
pub struct Aam {
    pub(crate) kind: AamKind,
    pub(crate) shape_models: Vec<PcaModel<Shape>>,
    pub(crate) appearance_models: Vec<PcaModel<Appearance>>,
    pub(crate) reference_shape: Shape,
    pub(crate) features: Features,
    pub(crate) sigma: Option<f64>,
    pub(crate) scales: Vec<f64>,
    pub(crate) scale_shapes: bool,
}

impl Aam {
    /// Validate and assemble a model.
    pub fn new(kind: AamKind, components: AamComponents) -> Result<Self> {
        let AamComponents {
            shape_models,
            appearance_models,
            reference_shape,
            features,
            sigma,
            scales,
            scale_shapes,
        } = components;

        let n_levels = scales.len();
        if n_levels == 0 {
            return Err(AamError::InconsistentModel(
                "a model needs at least one level".into(),
            ));
        }
        if shape_models.len() != n_levels || appearance_models.len() != n_levels {
            return Err(AamError::InconsistentModel(format!(
                "{} scales, {} shape models, {} appearance models",
                n_levels,
                shape_models.len(),
                appearance_models.len()
            )));
        }
        if let Some(s) = scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(AamError::InconsistentModel(format!(
                "scale factors must be positive, got {s}"
            )));
        }
        if let Features::PerLevel(fs) = &features {
            if fs.len() != n_levels {
                return Err(AamError::InconsistentModel(format!(
                    "{} per-level features for {} levels",
                    fs.len(),
                    n_levels
                )));
            }
        }
        if let Some(ps) = kind.patch_shape() {
            if ps.is_empty() {
                return Err(AamError::InconsistentModel(format!(
                    "patch shape must be non-empty, got {}x{}",
                    ps.height, ps.width
                )));
            }
        }

        for (level, am) in appearance_models.iter().enumerate() {
            let template = am.mean();
            if kind.uses_parts_appearance() != matches!(template, Appearance::Parts(_)) {
                return Err(AamError::InconsistentModel(format!(
                    "{} variant cannot use {} appearance (level {level})",
                    kind.name(),
                    template.kind_name()
                )));
            }
            if kind.synthesizes() && template.landmarks().source().is_none() {
                return Err(AamError::InconsistentModel(format!(
                    "appearance template of level {level} has no source landmarks"
                )));
            }
        }

        log::debug!(
            "assembled {} AAM: {} levels, scales {:?}",
            kind.name(),
            n_levels,
            scales
        );

        Ok(Self {
            kind,
            shape_models,
            appearance_models,
            reference_shape,
            features,
            sigma,
            scales,
            scale_shapes,
        })
    }

    pub fn global(components: AamComponents, transform: TransformKind) -> Result<Self> {
        Self::new(AamKind::Global { transform }, components)
    }

    pub fn patch(components: AamComponents, patch_shape: PatchShape) -> Result<Self> {
        Self::new(AamKind::Patch { patch_shape }, components)
    }

    pub fn linear_global(
        components: AamComponents,
        transform: TransformKind,
        n_landmarks: usize,
    ) -> Result<Self> {
        Self::new(
            AamKind::LinearGlobal {
                transform,
                n_landmarks,
            },
            components,
        )
    }

    pub fn linear_patch(
        components: AamComponents,
        patch_shape: PatchShape,
        n_landmarks: usize,
    ) -> Result<Self> {
        Self::new(
            AamKind::LinearPatch {
                patch_shape,
                n_landmarks,
            },
            components,
        )
    }

    pub fn parts(components: AamComponents, parts_shape: PatchShape) -> Result<Self> {
        Self::new(AamKind::Parts { parts_shape }, components)
    }

    /// Number of pyramid levels.
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.scales.len()
    }

    #[inline]
    pub fn kind(&self) -> AamKind {
        self.kind
    }

    #[inline]
    pub fn shape_models(&self) -> &[PcaModel<Shape>] {
        &self.shape_models
    }

    #[inline]
    pub fn appearance_models(&self) -> &[PcaModel<Appearance>] {
        &self.appearance_models
    }

    #[inline]
    pub fn reference_shape(&self) -> &Shape {
        &self.reference_shape
    }

    #[inline]
    pub fn features(&self) -> &Features {
        &self.features
    }

    #[inline]
    pub fn scale_features(&self) -> bool {
        self.features.scale_features()
    }

    #[inline]
    pub fn sigma(&self) -> Option<f64> {
        self.sigma
    }

    #[inline]
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    #[inline]
    pub fn scale_shapes(&self) -> bool {
        self.scale_shapes
    }

    /// Resolve a possibly negative level index (`-1` is the last level).
    pub fn resolve_level(&self, level: isize) -> Result<usize> {
        crate::sampler::resolve_level(level, self.n_levels())
    }

    /// Apply the feature of `level` to an image.
    pub fn level_features(&self, image: &MaskedImage, level: isize) -> Result<MaskedImage> {
        let idx = self.resolve_level(level)?;
        let feature = self.features.for_level(idx).ok_or_else(|| {
            AamError::InconsistentModel(format!("no feature configured for level {idx}"))
        })?;
        Ok(feature.apply_masked(image))
    }
}
