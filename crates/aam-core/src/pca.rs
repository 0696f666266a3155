//! Linear subspace models.
//!
//! A [`PcaModel`] stores an already-learned mean, basis and eigenvalue
//! spectrum. It only *instantiates*: training is someone else's job.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Objects that flatten to a parameter vector and can be rebuilt from one.
///
/// `from_vector` is called on a template and must keep everything that is
/// not part of the vector (masks, triangulations, landmarks).
pub trait Vectorizable: Clone {
    fn n_parameters(&self) -> usize;
    fn as_vector(&self) -> DVector<f64>;
    fn from_vector(&self, v: &DVector<f64>) -> Result<Self, VectorizeError>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VectorizeError {
    #[error("expected a vector of length {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("variant mismatch: template is {template}, vector describes {other}")]
    VariantMismatch {
        template: &'static str,
        other: &'static str,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PcaError {
    #[error("components have {components} columns, the mean has {mean} parameters")]
    FeatureMismatch { components: usize, mean: usize },
    #[error("{components} components but {eigenvalues} eigenvalues")]
    EigenvalueMismatch { components: usize, eigenvalues: usize },
    #[error("eigenvalue {index} is negative or not finite ({value})")]
    InvalidEigenvalue { index: usize, value: f64 },
    #[error("requested {requested} active components, model has {available}")]
    TooManyActiveComponents { requested: usize, available: usize },
    #[error("{given} weights given, only {available} active components")]
    TooManyWeights { given: usize, available: usize },
    #[error(transparent)]
    Vectorize(#[from] VectorizeError),
}

/// A learned linear subspace around a mean template.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(
    try_from = "RawPcaModel<T>",
    bound(
        serialize = "T: Serialize",
        deserialize = "T: Deserialize<'de> + Vectorizable"
    )
)]
pub struct PcaModel<T> {
    template: T,
    #[serde(skip_serializing)]
    mean: DVector<f64>,
    // row i is component i
    components: DMatrix<f64>,
    eigenvalues: DVector<f64>,
    n_active_components: usize,
}

#[derive(Deserialize)]
struct RawPcaModel<T> {
    template: T,
    components: DMatrix<f64>,
    eigenvalues: DVector<f64>,
    n_active_components: usize,
}

impl<T: Vectorizable> TryFrom<RawPcaModel<T>> for PcaModel<T> {
    type Error = PcaError;

    fn try_from(raw: RawPcaModel<T>) -> Result<Self, Self::Error> {
        PcaModel::new(
            raw.template,
            raw.components,
            raw.eigenvalues.as_slice().to_vec(),
        )?
        .with_n_active_components(raw.n_active_components)
    }
}

impl<T: Vectorizable> PcaModel<T> {
    /// Build a model from its mean template, a `n_components × n_parameters`
    /// basis and one eigenvalue per component. All components start active.
    pub fn new(
        template: T,
        components: DMatrix<f64>,
        eigenvalues: Vec<f64>,
    ) -> Result<Self, PcaError> {
        let mean = template.as_vector();
        if components.ncols() != mean.len() {
            return Err(PcaError::FeatureMismatch {
                components: components.ncols(),
                mean: mean.len(),
            });
        }
        if components.nrows() != eigenvalues.len() {
            return Err(PcaError::EigenvalueMismatch {
                components: components.nrows(),
                eigenvalues: eigenvalues.len(),
            });
        }
        if let Some((index, &value)) = eigenvalues
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(PcaError::InvalidEigenvalue { index, value });
        }
        let n_active_components = eigenvalues.len();
        Ok(Self {
            template,
            mean,
            components,
            eigenvalues: DVector::from_vec(eigenvalues),
            n_active_components,
        })
    }

    /// Restrict the model to its first `n` components.
    pub fn with_n_active_components(mut self, n: usize) -> Result<Self, PcaError> {
        if n > self.n_components() {
            return Err(PcaError::TooManyActiveComponents {
                requested: n,
                available: self.n_components(),
            });
        }
        self.n_active_components = n;
        Ok(self)
    }

    /// Mean template.
    #[inline]
    pub fn mean(&self) -> &T {
        &self.template
    }

    #[inline]
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    #[inline]
    pub fn n_active_components(&self) -> usize {
        self.n_active_components
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Eigenvalues of the active components.
    #[inline]
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues.as_slice()[..self.n_active_components]
    }

    /// `mean + Σ weights[i] * component[i]`.
    pub fn instance_vector(&self, weights: &[f64]) -> Result<DVector<f64>, PcaError> {
        if weights.len() > self.n_active_components {
            return Err(PcaError::TooManyWeights {
                given: weights.len(),
                available: self.n_active_components,
            });
        }
        let mut out = self.mean.clone();
        for (i, &w) in weights.iter().enumerate() {
            if w != 0.0 {
                out += self.components.row(i).transpose() * w;
            }
        }
        Ok(out)
    }

    pub fn instance(&self, weights: &[f64]) -> Result<T, PcaError> {
        let v = self.instance_vector(weights)?;
        Ok(self.template.from_vector(&v)?)
    }
}
