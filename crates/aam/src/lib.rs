//! Active appearance model variants.
//!
//! An [`Aam`] holds per-level shape and appearance subspaces learned
//! elsewhere and synthesizes new instances from them: weights are scaled by
//! the subspace eigenvalues, a shape and an appearance instance are drawn,
//! and the appearance is warped into a reference frame built around the
//! shape.
//!
//! Five variants share that pipeline (see [`AamKind`]): `Global`, `Patch`,
//! `LinearGlobal`, `LinearPatch` and `Parts`. The linear variants carry their
//! data but do not synthesize.
//!
//! ```no_run
//! use aam::{Aam, CallableRegistry};
//!
//! let aam = Aam::load_json("face_aam.json", &CallableRegistry::default())?;
//! let mean = aam.instance(None, None, -1)?;
//! let varied = aam.instance(Some(&[2.0, -1.0]), None, -1)?;
//! # let _ = (mean, varied);
//! # Ok::<(), aam::AamError>(())
//! ```

mod compose;
mod error;
mod features;
mod frame;
mod io;
mod model;
mod persist;
mod sampler;

#[cfg(feature = "image")]
mod export;

pub use compose::AamInstance;
pub use error::{AamError, ErrorKind, Result};
pub use features::{
    builtin_features, gradient, igo, no_op, Feature, Features, FEATURE_MODULE, GRADIENT, IGO,
    NO_OP,
};
pub use io::{run_synthesis, AamIoError, SynthesisConfig, SynthesisOutcome, SynthesisReport};
pub use model::{Aam, AamComponents, AamKind, Appearance};
pub use persist::{
    CallableRegistry, PersistedAam, PersistedFeatures, PersistedKind, SerializableCallable,
};
pub use sampler::{resolve_level, scale_weights, DEFAULT_WEIGHTS};

#[cfg(feature = "image")]
pub use export::{instance_to_gray, masked_image_to_gray, parts_to_gray, save_instance_image};

pub use aam_core as core;
