//! Weighted instance sampling.
//!
//! Weights are expressed in units of standard deviation: the `i`-th weight
//! is multiplied by `sqrt(eigenvalue[i])` before it reaches the subspace.

use rand::Rng;
use rand_distr::StandardNormal;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::compose::AamInstance;
use crate::error::{AamError, Result};
use crate::model::Aam;

/// Weight vector used when the caller passes none: a single zero.
pub const DEFAULT_WEIGHTS: [f64; 1] = [0.0];

/// Map a possibly negative level index onto `0..n_levels`.
pub fn resolve_level(level: isize, n_levels: usize) -> Result<usize> {
    let n = n_levels as isize;
    let idx = if level < 0 { n + level } else { level };
    if idx < 0 || idx >= n {
        return Err(AamError::LevelOutOfRange { level, n_levels });
    }
    Ok(idx as usize)
}

/// `weights[i] * sqrt(eigenvalues[i])` for every given weight.
pub fn scale_weights(weights: &[f64], eigenvalues: &[f64]) -> Result<Vec<f64>> {
    if weights.len() > eigenvalues.len() {
        return Err(AamError::TooManyWeights {
            given: weights.len(),
            available: eigenvalues.len(),
        });
    }
    Ok(weights
        .iter()
        .zip(eigenvalues)
        .map(|(w, ev)| w * ev.sqrt())
        .collect())
}

fn draw_scaled<R: Rng + ?Sized>(rng: &mut R, eigenvalues: &[f64]) -> Vec<f64> {
    eigenvalues
        .iter()
        .map(|ev| rng.sample::<f64, _>(StandardNormal) * ev.sqrt())
        .collect()
}

impl Aam {
    /// Shape weights of `level` after eigenvalue scaling.
    pub fn scaled_shape_weights(&self, weights: Option<&[f64]>, level: isize) -> Result<Vec<f64>> {
        let idx = self.resolve_level(level)?;
        scale_weights(
            weights.unwrap_or(&DEFAULT_WEIGHTS),
            self.shape_models[idx].eigenvalues(),
        )
    }

    /// Appearance weights of `level` after eigenvalue scaling.
    pub fn scaled_appearance_weights(
        &self,
        weights: Option<&[f64]>,
        level: isize,
    ) -> Result<Vec<f64>> {
        let idx = self.resolve_level(level)?;
        scale_weights(
            weights.unwrap_or(&DEFAULT_WEIGHTS),
            self.appearance_models[idx].eigenvalues(),
        )
    }

    fn ensure_synthesizes(&self, operation: &'static str) -> Result<()> {
        if self.kind.synthesizes() {
            Ok(())
        } else {
            Err(AamError::UnsupportedOperation {
                operation,
                variant: self.kind.name(),
            })
        }
    }

    /// Synthesize an instance at `level` from shape and appearance weights.
    ///
    /// Omitted weights default to a single zero weight, which yields the
    /// mean of the subspace.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, shape_weights, appearance_weights))
    )]
    pub fn instance(
        &self,
        shape_weights: Option<&[f64]>,
        appearance_weights: Option<&[f64]>,
        level: isize,
    ) -> Result<AamInstance> {
        self.ensure_synthesizes("instance")?;
        let idx = self.resolve_level(level)?;
        let sw = self.scaled_shape_weights(shape_weights, level)?;
        let aw = self.scaled_appearance_weights(appearance_weights, level)?;
        log::debug!("instance at level {idx}: shape weights {sw:?}, appearance weights {aw:?}");
        self.instance_from_scaled(idx, &sw, &aw)
    }

    /// Synthesize an instance from standard-normal weights drawn with the
    /// thread-local RNG.
    pub fn random_instance(&self, level: isize) -> Result<AamInstance> {
        self.random_instance_with_rng(level, &mut rand::thread_rng())
    }

    /// Like [`Aam::random_instance`] with a caller-provided RNG.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, rng)))]
    pub fn random_instance_with_rng<R: Rng + ?Sized>(
        &self,
        level: isize,
        rng: &mut R,
    ) -> Result<AamInstance> {
        self.ensure_synthesizes("random_instance")?;
        let idx = self.resolve_level(level)?;
        let sw = draw_scaled(rng, self.shape_models[idx].eigenvalues());
        let aw = draw_scaled(rng, self.appearance_models[idx].eigenvalues());
        log::debug!(
            "random instance at level {idx}: {} shape, {} appearance weights",
            sw.len(),
            aw.len()
        );
        self.instance_from_scaled(idx, &sw, &aw)
    }

    fn instance_from_scaled(
        &self,
        level: usize,
        shape_weights: &[f64],
        appearance_weights: &[f64],
    ) -> Result<AamInstance> {
        let shape_instance = self.shape_models[level].instance(shape_weights)?;
        let appearance_instance = self.appearance_models[level].instance(appearance_weights)?;
        self.compose(level, &shape_instance, appearance_instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn negative_levels_count_from_the_end() {
        assert_eq!(resolve_level(0, 3).unwrap(), 0);
        assert_eq!(resolve_level(-1, 3).unwrap(), 2);
        assert_eq!(resolve_level(-3, 3).unwrap(), 0);
        assert!(matches!(
            resolve_level(3, 3),
            Err(AamError::LevelOutOfRange {
                level: 3,
                n_levels: 3
            })
        ));
        assert!(resolve_level(-4, 3).is_err());
        assert!(resolve_level(0, 0).is_err());
    }

    #[test]
    fn weights_scale_by_root_eigenvalue() {
        let scaled = scale_weights(&[1.0, -2.0], &[4.0, 0.25, 9.0]).unwrap();
        assert_relative_eq!(scaled[0], 2.0);
        assert_relative_eq!(scaled[1], -1.0);
        assert!(scale_weights(&[], &[4.0]).unwrap().is_empty());
    }

    #[test]
    fn excess_weights_are_rejected() {
        let err = scale_weights(&[1.0, 1.0, 1.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            AamError::TooManyWeights {
                given: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn draws_are_reproducible_with_a_seeded_rng() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let ev = [4.0, 1.0, 0.0];
        let a = draw_scaled(&mut ChaCha8Rng::seed_from_u64(7), &ev);
        let b = draw_scaled(&mut ChaCha8Rng::seed_from_u64(7), &ev);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(a[2], 0.0);
    }
}
