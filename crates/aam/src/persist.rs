//! Persisted form of an [`Aam`].
//!
//! Function-valued fields (feature extractors, transform constructors) are
//! stored as a [`SerializableCallable`]: a name plus the modules it may be
//! found in. On reload the name is resolved through a [`CallableRegistry`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use aam_core::{PatchShape, PcaModel, Shape, TransformKind, TRANSFORM_MODULE};

use crate::error::{AamError, Result};
use crate::features::{builtin_features, Feature, Features};
use crate::model::{Aam, AamComponents, AamKind, Appearance};

/// A reference to a named function, resolvable on reload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableCallable {
    pub name: String,
    pub modules: Vec<String>,
}

impl SerializableCallable {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: vec![module.into()],
        }
    }

    fn of_feature(feature: &Feature) -> Self {
        Self::new(feature.name(), feature.module())
    }

    fn of_transform(kind: TransformKind) -> Self {
        Self::new(kind.name(), TRANSFORM_MODULE)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedFeatures {
    /// One feature for every level.
    Shared(SerializableCallable),
    /// One feature per level, coarsest first.
    PerLevel(Vec<SerializableCallable>),
}

/// Variant tag and variant-only fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum PersistedKind {
    Global,
    Patch {
        patch_shape: PatchShape,
    },
    LinearGlobal {
        n_landmarks: usize,
    },
    LinearPatch {
        patch_shape: PatchShape,
        n_landmarks: usize,
    },
    Parts {
        parts_shape: PatchShape,
    },
}

/// Every field of an [`Aam`] in a serializable form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedAam {
    pub kind: PersistedKind,
    pub shape_models: Vec<PcaModel<Shape>>,
    pub appearance_models: Vec<PcaModel<Appearance>>,
    pub reference_shape: Shape,
    pub features: PersistedFeatures,
    pub scale_features: bool,
    /// Absent for the parts variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<SerializableCallable>,
    #[serde(default)]
    pub sigma: Option<f64>,
    pub scales: Vec<f64>,
    pub scale_shapes: bool,
}

/// Lookup table from `(module, name)` to callables.
#[derive(Clone, Debug)]
pub struct CallableRegistry {
    features: BTreeMap<String, BTreeMap<String, Feature>>,
    transforms: BTreeMap<String, BTreeMap<String, TransformKind>>,
}

impl Default for CallableRegistry {
    /// Registry with the built-in features and transforms.
    fn default() -> Self {
        let mut registry = Self::empty();
        for feature in builtin_features() {
            registry.register_feature(feature);
        }
        for kind in TransformKind::ALL {
            registry.register_transform(TRANSFORM_MODULE, kind.name(), kind);
        }
        registry
    }
}

impl CallableRegistry {
    pub fn empty() -> Self {
        Self {
            features: BTreeMap::new(),
            transforms: BTreeMap::new(),
        }
    }

    /// Register a feature under its own module and name.
    pub fn register_feature(&mut self, feature: Feature) -> &mut Self {
        self.features
            .entry(feature.module().to_string())
            .or_default()
            .insert(feature.name().to_string(), feature);
        self
    }

    /// Register `kind` under an arbitrary `(module, name)`.
    pub fn register_transform(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        kind: TransformKind,
    ) -> &mut Self {
        self.transforms
            .entry(module.into())
            .or_default()
            .insert(name.into(), kind);
        self
    }

    fn lookup<T: Copy>(
        table: &BTreeMap<String, BTreeMap<String, T>>,
        callable: &SerializableCallable,
    ) -> Result<T> {
        callable
            .modules
            .iter()
            .find_map(|m| table.get(m).and_then(|names| names.get(&callable.name)))
            .copied()
            .ok_or_else(|| AamError::UnknownCallable {
                name: callable.name.clone(),
                modules: callable.modules.clone(),
            })
    }

    pub fn resolve_feature(&self, callable: &SerializableCallable) -> Result<Feature> {
        Self::lookup(&self.features, callable)
    }

    pub fn resolve_transform(&self, callable: &SerializableCallable) -> Result<TransformKind> {
        Self::lookup(&self.transforms, callable)
    }
}

impl Aam {
    /// Snapshot every field into its persisted form.
    pub fn to_persistable(&self) -> PersistedAam {
        let kind = match self.kind {
            AamKind::Global { .. } => PersistedKind::Global,
            AamKind::Patch { patch_shape } => PersistedKind::Patch { patch_shape },
            AamKind::LinearGlobal { n_landmarks, .. } => PersistedKind::LinearGlobal { n_landmarks },
            AamKind::LinearPatch {
                patch_shape,
                n_landmarks,
            } => PersistedKind::LinearPatch {
                patch_shape,
                n_landmarks,
            },
            AamKind::Parts { parts_shape } => PersistedKind::Parts { parts_shape },
        };
        let features = match &self.features {
            Features::Shared(f) => PersistedFeatures::Shared(SerializableCallable::of_feature(f)),
            Features::PerLevel(fs) => PersistedFeatures::PerLevel(
                fs.iter().map(SerializableCallable::of_feature).collect(),
            ),
        };

        PersistedAam {
            kind,
            shape_models: self.shape_models.clone(),
            appearance_models: self.appearance_models.clone(),
            reference_shape: self.reference_shape.clone(),
            features,
            scale_features: self.scale_features(),
            transform: self.kind.transform().map(SerializableCallable::of_transform),
            sigma: self.sigma,
            scales: self.scales.clone(),
            scale_shapes: self.scale_shapes,
        }
    }

    /// Rebuild a model, resolving callables through `registry`.
    pub fn from_persistable(persisted: PersistedAam, registry: &CallableRegistry) -> Result<Self> {
        let PersistedAam {
            kind,
            shape_models,
            appearance_models,
            reference_shape,
            features,
            scale_features,
            transform,
            sigma,
            scales,
            scale_shapes,
        } = persisted;

        let features = match features {
            PersistedFeatures::Shared(c) => Features::Shared(registry.resolve_feature(&c)?),
            PersistedFeatures::PerLevel(cs) => Features::PerLevel(
                cs.iter()
                    .map(|c| registry.resolve_feature(c))
                    .collect::<Result<_>>()?,
            ),
        };
        if features.scale_features() != scale_features {
            return Err(AamError::InconsistentModel(format!(
                "scale_features is {scale_features} but the feature layout says {}",
                features.scale_features()
            )));
        }

        let transform = transform
            .as_ref()
            .map(|c| registry.resolve_transform(c))
            .transpose()?;
        let required_transform = || {
            transform.ok_or_else(|| {
                AamError::InconsistentModel("persisted model has no transform".into())
            })
        };
        let expect_tps = || -> Result<()> {
            match required_transform()? {
                TransformKind::ThinPlateSplines => Ok(()),
                other => Err(AamError::InconsistentModel(format!(
                    "patch variants warp with ThinPlateSplines, got {}",
                    other.name()
                ))),
            }
        };

        let kind = match kind {
            PersistedKind::Global => AamKind::Global {
                transform: required_transform()?,
            },
            PersistedKind::LinearGlobal { n_landmarks } => AamKind::LinearGlobal {
                transform: required_transform()?,
                n_landmarks,
            },
            PersistedKind::Patch { patch_shape } => {
                expect_tps()?;
                AamKind::Patch { patch_shape }
            }
            PersistedKind::LinearPatch {
                patch_shape,
                n_landmarks,
            } => {
                expect_tps()?;
                AamKind::LinearPatch {
                    patch_shape,
                    n_landmarks,
                }
            }
            PersistedKind::Parts { parts_shape } => {
                if let Some(t) = transform {
                    log::warn!("ignoring persisted transform {} on a parts model", t.name());
                }
                AamKind::Parts { parts_shape }
            }
        };

        Aam::new(
            kind,
            AamComponents {
                shape_models,
                appearance_models,
                reference_shape,
                features,
                sigma,
                scales,
                scale_shapes,
            },
        )
    }

    /// Write the persisted form to disk as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.to_persistable())?;
        fs::write(path, json)?;
        log::info!("saved {} model to {}", self.kind.name(), path.display());
        Ok(())
    }

    /// Load a model written by [`Aam::save_json`].
    pub fn load_json(path: impl AsRef<Path>, registry: &CallableRegistry) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let persisted: PersistedAam = serde_json::from_str(&raw)?;
        let aam = Self::from_persistable(persisted, registry)?;
        log::info!(
            "loaded {} model with {} levels from {}",
            aam.kind.name(),
            aam.n_levels(),
            path.display()
        );
        Ok(aam)
    }
}
