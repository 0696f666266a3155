//! Point-to-point warps between landmark sets.
//!
//! Both warps are built from a `source → target` correspondence and map any
//! point of the source space into the target space.

use nalgebra::{DMatrix, Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::Shape;

/// Module path under which the built-in transforms are registered for
/// persistence.
pub const TRANSFORM_MODULE: &str = "aam_core::transform";

/// A mapping of 2D points. `None` means the point lies outside the domain.
pub trait Transform {
    fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("source has {source_len} points, target has {target_len}")]
    LengthMismatch {
        source_len: usize,
        target_len: usize,
    },
    #[error("need at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("thin-plate-spline system is singular (coincident or collinear landmarks?)")]
    Singular,
    #[error("piecewise-affine warp needs a triangulated source shape")]
    MissingTriangulation,
}

fn check_lengths(
    source: &[Point2<f64>],
    target: &[Point2<f64>],
    needed: usize,
) -> Result<(), TransformError> {
    if source.len() != target.len() {
        return Err(TransformError::LengthMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }
    if source.len() < needed {
        return Err(TransformError::TooFewPoints {
            needed,
            got: source.len(),
        });
    }
    Ok(())
}

// U(r) = r^2 log r^2, with U(0) = 0
#[inline]
fn tps_kernel(r2: f64) -> f64 {
    if r2 <= f64::EPSILON {
        0.0
    } else {
        r2 * r2.ln()
    }
}

/// Thin-plate-spline interpolation of a landmark correspondence.
#[derive(Clone, Debug)]
pub struct ThinPlateSplines {
    source: Vec<Point2<f64>>,
    // per-landmark kernel weights, one column per output coordinate
    weights: DMatrix<f64>,
    // affine part rows: [1, x, y]
    affine: DMatrix<f64>,
}

impl ThinPlateSplines {
    pub fn new(source: &[Point2<f64>], target: &[Point2<f64>]) -> Result<Self, TransformError> {
        check_lengths(source, target, 3)?;
        let n = source.len();

        // L = [K P; P^T 0]
        let mut l = DMatrix::<f64>::zeros(n + 3, n + 3);
        for i in 0..n {
            for j in 0..n {
                l[(i, j)] = tps_kernel((source[i] - source[j]).norm_squared());
            }
            let row = [1.0, source[i].x, source[i].y];
            for (k, v) in row.into_iter().enumerate() {
                l[(i, n + k)] = v;
                l[(n + k, i)] = v;
            }
        }

        let mut rhs = DMatrix::<f64>::zeros(n + 3, 2);
        for (i, t) in target.iter().enumerate() {
            rhs[(i, 0)] = t.x;
            rhs[(i, 1)] = t.y;
        }

        let sol = l.lu().solve(&rhs).ok_or(TransformError::Singular)?;
        if sol.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::Singular);
        }

        Ok(Self {
            source: source.to_vec(),
            weights: sol.view((0, 0), (n, 2)).into_owned(),
            affine: sol.view((n, 0), (3, 2)).into_owned(),
        })
    }

    #[inline]
    pub fn n_points(&self) -> usize {
        self.source.len()
    }
}

impl Transform for ThinPlateSplines {
    fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let a = &self.affine;
        let mut x = a[(0, 0)] + a[(1, 0)] * p.x + a[(2, 0)] * p.y;
        let mut y = a[(0, 1)] + a[(1, 1)] * p.x + a[(2, 1)] * p.y;
        for (i, s) in self.source.iter().enumerate() {
            let u = tps_kernel((p - s).norm_squared());
            x += self.weights[(i, 0)] * u;
            y += self.weights[(i, 1)] * u;
        }
        Some(Point2::new(x, y))
    }
}

#[derive(Clone, Copy, Debug)]
struct AffineTriangle {
    origin: Point2<f64>,
    // maps (p - origin) to barycentric (beta, gamma)
    to_barycentric: Matrix2<f64>,
    target: [Point2<f64>; 3],
}

/// Per-triangle affine warp over a source triangulation.
#[derive(Clone, Debug)]
pub struct PiecewiseAffine {
    triangles: Vec<AffineTriangle>,
}

const BARYCENTRIC_EPS: f64 = 1e-9;

impl PiecewiseAffine {
    /// Degenerate triangles are skipped.
    pub fn new(
        source: &[Point2<f64>],
        trilist: &[[usize; 3]],
        target: &[Point2<f64>],
    ) -> Result<Self, TransformError> {
        check_lengths(source, target, 3)?;
        let mut triangles = Vec::with_capacity(trilist.len());
        for &[i, j, k] in trilist {
            let (Some(&a), Some(&b), Some(&c)) = (source.get(i), source.get(j), source.get(k))
            else {
                return Err(TransformError::TooFewPoints {
                    needed: i.max(j).max(k) + 1,
                    got: source.len(),
                });
            };
            let m = Matrix2::from_columns(&[b - a, c - a]);
            let Some(inv) = m.try_inverse() else {
                continue;
            };
            triangles.push(AffineTriangle {
                origin: a,
                to_barycentric: inv,
                target: [target[i], target[j], target[k]],
            });
        }
        Ok(Self { triangles })
    }

    #[inline]
    pub fn n_triangles(&self) -> usize {
        self.triangles.len()
    }
}

impl Transform for PiecewiseAffine {
    fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        self.triangles.iter().find_map(|tri| {
            let bc: Vector2<f64> = tri.to_barycentric * (p - tri.origin);
            let (beta, gamma) = (bc.x, bc.y);
            let alpha = 1.0 - beta - gamma;
            if alpha < -BARYCENTRIC_EPS || beta < -BARYCENTRIC_EPS || gamma < -BARYCENTRIC_EPS {
                return None;
            }
            let [ta, tb, tc] = tri.target;
            Some(Point2::new(
                alpha * ta.x + beta * tb.x + gamma * tc.x,
                alpha * ta.y + beta * tb.y + gamma * tc.y,
            ))
        })
    }
}

/// Identifies a transform constructor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[default]
    ThinPlateSplines,
    PiecewiseAffine,
}

impl TransformKind {
    pub const ALL: [TransformKind; 2] = [
        TransformKind::ThinPlateSplines,
        TransformKind::PiecewiseAffine,
    ];

    /// Constructor name, as persisted.
    pub fn name(self) -> &'static str {
        match self {
            TransformKind::ThinPlateSplines => "ThinPlateSplines",
            TransformKind::PiecewiseAffine => "PiecewiseAffine",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Build the warp taking `source` onto `target`.
    ///
    /// The piecewise-affine warp triangulates with `source`'s triangle list.
    pub fn build(self, source: &Shape, target: &Shape) -> Result<Box<dyn Transform>, TransformError> {
        match self {
            TransformKind::ThinPlateSplines => Ok(Box::new(ThinPlateSplines::new(
                source.points(),
                target.points(),
            )?)),
            TransformKind::PiecewiseAffine => {
                let trilist = source
                    .trilist()
                    .ok_or(TransformError::MissingTriangulation)?;
                Ok(Box::new(PiecewiseAffine::new(
                    source.points(),
                    trilist,
                    target.points(),
                )?))
            }
        }
    }
}
