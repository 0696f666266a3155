//! Landmark geometry: plain point clouds and triangulated meshes.

use nalgebra::{DVector, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::pca::{Vectorizable, VectorizeError};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("triangle {triangle} references point {index}, but the mesh has {n_points} points")]
    TriangleIndexOutOfRange {
        triangle: usize,
        index: usize,
        n_points: usize,
    },
}

/// An ordered set of 2D landmarks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Point2<f64>>,
}

impl PointCloud {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }
}

/// Landmarks plus a triangle list over them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTriMesh")]
pub struct TriMesh {
    points: Vec<Point2<f64>>,
    trilist: Vec<[usize; 3]>,
}

#[derive(Deserialize)]
struct RawTriMesh {
    points: Vec<Point2<f64>>,
    trilist: Vec<[usize; 3]>,
}

impl TryFrom<RawTriMesh> for TriMesh {
    type Error = ShapeError;

    fn try_from(raw: RawTriMesh) -> Result<Self, Self::Error> {
        TriMesh::new(raw.points, raw.trilist)
    }
}

impl TriMesh {
    /// Validate the triangle list against the point count.
    pub fn new(points: Vec<Point2<f64>>, trilist: Vec<[usize; 3]>) -> Result<Self, ShapeError> {
        let n_points = points.len();
        for (triangle, tri) in trilist.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i >= n_points) {
                return Err(ShapeError::TriangleIndexOutOfRange {
                    triangle,
                    index,
                    n_points,
                });
            }
        }
        Ok(Self { points, trilist })
    }

    #[inline]
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    #[inline]
    pub fn trilist(&self) -> &[[usize; 3]] {
        &self.trilist
    }
}

/// Either kind of landmark geometry.
///
/// Code that needs a triangulation asks for [`Shape::trilist`] rather than
/// matching on the variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    PointCloud(PointCloud),
    TriMesh(TriMesh),
}

impl Shape {
    pub fn point_cloud(points: Vec<Point2<f64>>) -> Self {
        Shape::PointCloud(PointCloud::new(points))
    }

    pub fn tri_mesh(points: Vec<Point2<f64>>, trilist: Vec<[usize; 3]>) -> Result<Self, ShapeError> {
        Ok(Shape::TriMesh(TriMesh::new(points, trilist)?))
    }

    pub fn points(&self) -> &[Point2<f64>] {
        match self {
            Shape::PointCloud(pc) => &pc.points,
            Shape::TriMesh(mesh) => mesh.points(),
        }
    }

    #[inline]
    pub fn n_points(&self) -> usize {
        self.points().len()
    }

    pub fn trilist(&self) -> Option<&[[usize; 3]]> {
        match self {
            Shape::PointCloud(_) => None,
            Shape::TriMesh(mesh) => Some(mesh.trilist()),
        }
    }

    #[inline]
    pub fn is_tri_mesh(&self) -> bool {
        matches!(self, Shape::TriMesh(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::PointCloud(_) => "point_cloud",
            Shape::TriMesh(_) => "tri_mesh",
        }
    }

    /// Axis-aligned bounds `(min, max)`, `None` for an empty shape.
    pub fn bounds(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        let mut it = self.points().iter();
        let first = *it.next()?;
        let (mut min, mut max) = (first, first);
        for p in it {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some((min, max))
    }

    /// Copy of this shape shifted by `offset`; the geometric kind is kept.
    pub fn translated(&self, offset: Vector2<f64>) -> Self {
        let points = self.points().iter().map(|p| p + offset).collect();
        self.with_points(points)
    }

    /// Drop any triangulation.
    pub fn to_point_cloud(&self) -> Self {
        Shape::point_cloud(self.points().to_vec())
    }

    // Triangle indices stay valid because the point count is unchanged.
    fn with_points(&self, points: Vec<Point2<f64>>) -> Self {
        match self {
            Shape::PointCloud(_) => Shape::point_cloud(points),
            Shape::TriMesh(mesh) => Shape::TriMesh(TriMesh {
                points,
                trilist: mesh.trilist.clone(),
            }),
        }
    }
}

impl Vectorizable for Shape {
    fn n_parameters(&self) -> usize {
        2 * self.n_points()
    }

    fn as_vector(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.n_parameters(),
            self.points().iter().flat_map(|p| [p.x, p.y]),
        )
    }

    fn from_vector(&self, v: &DVector<f64>) -> Result<Self, VectorizeError> {
        if v.len() != self.n_parameters() {
            return Err(VectorizeError::LengthMismatch {
                expected: self.n_parameters(),
                actual: v.len(),
            });
        }
        let points = v
            .as_slice()
            .chunks_exact(2)
            .map(|c| Point2::new(c[0], c[1]))
            .collect();
        Ok(self.with_points(points))
    }
}
