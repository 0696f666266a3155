//! JSON synthesis requests and reports.

use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::compose::AamInstance;
use crate::error::AamError;
use crate::model::Aam;
use crate::persist::CallableRegistry;

#[derive(thiserror::Error, Debug)]
pub enum AamIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] AamError),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}

fn default_level() -> isize {
    -1
}

/// A synthesis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    pub model_path: String,
    #[serde(default = "default_level")]
    pub level: isize,
    #[serde(default)]
    pub shape_weights: Option<Vec<f64>>,
    #[serde(default)]
    pub appearance_weights: Option<Vec<f64>>,
    /// Draw weights instead of using the given ones.
    #[serde(default)]
    pub random: bool,
    /// Seed for random draws; unseeded draws use the thread RNG.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub report_path: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl SynthesisConfig {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            level: default_level(),
            shape_weights: None,
            appearance_weights: None,
            random: false,
            seed: None,
            report_path: None,
            image_path: None,
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, AamIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), AamIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("aam_synthesis_report.json"))
    }

    /// Synthesize from an already loaded model.
    pub fn synthesize(&self, aam: &Aam) -> Result<AamInstance, AamError> {
        if self.random {
            match self.seed {
                Some(seed) => {
                    aam.random_instance_with_rng(self.level, &mut ChaCha8Rng::seed_from_u64(seed))
                }
                None => aam.random_instance(self.level),
            }
        } else {
            aam.instance(
                self.shape_weights.as_deref(),
                self.appearance_weights.as_deref(),
                self.level,
            )
        }
    }
}

/// Summary of one synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub model_path: String,
    pub variant: String,
    pub n_levels: usize,
    pub level: isize,
    #[serde(default)]
    pub resolved_level: Option<usize>,
    pub random: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub width: Option<usize>,
    #[serde(default)]
    pub height: Option<usize>,
    #[serde(default)]
    pub masked_pixels: Option<usize>,
    #[serde(default)]
    pub n_parts: Option<usize>,
    #[serde(default)]
    pub n_landmarks: Option<usize>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SynthesisReport {
    /// Base report for a request against a loaded model.
    pub fn new(cfg: &SynthesisConfig, aam: &Aam) -> Self {
        Self {
            model_path: cfg.model_path.clone(),
            variant: aam.kind().name().to_string(),
            n_levels: aam.n_levels(),
            level: cfg.level,
            resolved_level: aam.resolve_level(cfg.level).ok(),
            random: cfg.random,
            seed: cfg.seed,
            width: None,
            height: None,
            masked_pixels: None,
            n_parts: None,
            n_landmarks: None,
            image_path: None,
            error: None,
        }
    }

    /// Populate geometry fields from a synthesized instance.
    pub fn set_instance(&mut self, instance: &AamInstance) {
        let (width, height) = instance.dimensions();
        self.width = Some(width);
        self.height = Some(height);
        self.n_landmarks = instance.source().map(|s| s.n_points());
        match instance {
            AamInstance::Image(img) => self.masked_pixels = Some(img.mask.n_true()),
            AamInstance::Parts(parts) => self.n_parts = Some(parts.n_parts),
        }
        self.error = None;
    }

    pub fn set_error(&mut self, err: &AamError) {
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, AamIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), AamIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Result of [`run_synthesis`]; `instance` is `None` when synthesis failed
/// and `report.error` says why.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub instance: Option<AamInstance>,
    pub report: SynthesisReport,
}

/// Load the model named by `cfg` and synthesize one instance.
///
/// Failing to load the model is an error; a failed synthesis is recorded in
/// the report instead.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(registry)))]
pub fn run_synthesis(
    cfg: &SynthesisConfig,
    registry: &CallableRegistry,
) -> Result<SynthesisOutcome, AamIoError> {
    let aam = Aam::load_json(&cfg.model_path, registry)?;
    let mut report = SynthesisReport::new(cfg, &aam);

    let instance = match cfg.synthesize(&aam) {
        Ok(instance) => {
            report.set_instance(&instance);
            Some(instance)
        }
        Err(err) => {
            log::error!("synthesis failed: {err}");
            report.set_error(&err);
            None
        }
    };

    #[cfg(feature = "image")]
    if let (Some(instance), Some(path)) = (instance.as_ref(), cfg.image_path.as_ref()) {
        crate::export::save_instance_image(instance, path)?;
        report.image_path = Some(path.clone());
    }

    Ok(SynthesisOutcome { instance, report })
}
