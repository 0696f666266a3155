//! Feature extraction callables.
//!
//! A [`Feature`] is a plain function pointer with a stable `(module, name)`
//! identity, which is what gets persisted.

use std::fmt;

use aam_core::{Image, MaskedImage};

/// Module path of the built-in features.
pub const FEATURE_MODULE: &str = "aam::feature";

/// A named image-to-image feature function.
#[derive(Clone, Copy)]
pub struct Feature {
    module: &'static str,
    name: &'static str,
    func: fn(&Image) -> Image,
}

impl Feature {
    pub const fn new(module: &'static str, name: &'static str, func: fn(&Image) -> Image) -> Self {
        Self { module, name, func }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn module(&self) -> &'static str {
        self.module
    }

    #[inline]
    pub fn apply(&self, image: &Image) -> Image {
        (self.func)(image)
    }

    /// Apply to the pixels, keeping mask and landmarks.
    pub fn apply_masked(&self, image: &MaskedImage) -> MaskedImage {
        MaskedImage {
            image: self.apply(&image.image),
            mask: image.mask.clone(),
            landmarks: image.landmarks.clone(),
        }
    }
}

// Identity is the persisted (module, name) pair.
impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.name == other.name
    }
}

impl Eq for Feature {}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Feature({}::{})", self.module, self.name)
    }
}

/// Raw pixels.
pub const NO_OP: Feature = Feature::new(FEATURE_MODULE, "no_op", no_op);
/// Per-channel `(d/dx, d/dy)`.
pub const GRADIENT: Feature = Feature::new(FEATURE_MODULE, "gradient", gradient);
/// Per-channel image gradient orientation `(cos θ, sin θ)`.
pub const IGO: Feature = Feature::new(FEATURE_MODULE, "igo", igo);

pub fn builtin_features() -> [Feature; 3] {
    [NO_OP, GRADIENT, IGO]
}

pub fn no_op(image: &Image) -> Image {
    image.clone()
}

// Central differences inside, one-sided at the border.
fn derivative(image: &Image, x: usize, y: usize, c: usize, along_x: bool) -> f64 {
    let (len, pos) = if along_x {
        (image.width, x)
    } else {
        (image.height, y)
    };
    if len < 2 {
        return 0.0;
    }
    let at = |i: usize| {
        if along_x {
            image.pixel(i, y)[c]
        } else {
            image.pixel(x, i)[c]
        }
    };
    if pos == 0 {
        at(1) - at(0)
    } else if pos == len - 1 {
        at(pos) - at(pos - 1)
    } else {
        0.5 * (at(pos + 1) - at(pos - 1))
    }
}

pub fn gradient(image: &Image) -> Image {
    let mut out = Image::zeros(image.width, image.height, 2 * image.n_channels);
    for y in 0..image.height {
        for x in 0..image.width {
            for c in 0..image.n_channels {
                let gx = derivative(image, x, y, c, true);
                let gy = derivative(image, x, y, c, false);
                let px = out.pixel_mut(x, y);
                px[2 * c] = gx;
                px[2 * c + 1] = gy;
            }
        }
    }
    out
}

pub fn igo(image: &Image) -> Image {
    let mut out = gradient(image);
    for pair in out.pixels.chunks_exact_mut(2) {
        let theta = pair[1].atan2(pair[0]);
        pair[0] = theta.cos();
        pair[1] = theta.sin();
    }
    out
}

/// Feature configuration of a model.
///
/// `Shared` is the "scale features" layout: one function for every level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Features {
    Shared(Feature),
    PerLevel(Vec<Feature>),
}

impl Features {
    #[inline]
    pub fn scale_features(&self) -> bool {
        matches!(self, Features::Shared(_))
    }

    /// Feature used at the (already resolved) level index.
    pub fn for_level(&self, level: usize) -> Option<Feature> {
        match self {
            Features::Shared(f) => Some(*f),
            Features::PerLevel(fs) => fs.get(level).copied(),
        }
    }
}
