//! Collision shape descriptors

use crate::error::{Result, SpaceError};
use rapier3d::na::DMatrix;
use rapier3d::parry::math::{Point, Real, Vector};
use rapier3d::parry::shape::SharedShape;
use serde::{Deserialize, Serialize};

/// Collision shape type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColliderShape {
    /// Sphere with radius
    Sphere {
        radius: f32,
    },
    /// Box with half-extents
    Box {
        half_extents: [f32; 3],
    },
    /// Capsule aligned along Y axis
    CapsuleY {
        half_height: f32,
        radius: f32,
    },
    /// Cylinder aligned along Y axis
    CylinderY {
        half_height: f32,
        radius: f32,
    },
    /// Cone aligned along Y axis
    ConeY {
        half_height: f32,
        radius: f32,
    },
    /// Convex hull from points
    ConvexHull {
        points: Vec<[f32; 3]>,
    },
    /// Triangle mesh (static only, not sweepable)
    TriMesh {
        vertices: Vec<[f32; 3]>,
        indices: Vec<[u32; 3]>,
    },
    /// Heightfield terrain (static only, not sweepable)
    HeightField {
        heights: Vec<f32>,
        rows: usize,
        cols: usize,
        scale: [f32; 3],
    },
}

impl Default for ColliderShape {
    fn default() -> Self {
        Self::Box {
            half_extents: [0.5, 0.5, 0.5],
        }
    }
}

impl ColliderShape {
    /// Create a sphere shape
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box shape from half-extents
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self::Box {
            half_extents: [hx, hy, hz],
        }
    }

    /// Create a box shape from full size
    pub fn from_size(width: f32, height: f32, depth: f32) -> Self {
        Self::Box {
            half_extents: [width * 0.5, height * 0.5, depth * 0.5],
        }
    }

    /// Create a capsule shape (Y-aligned)
    pub fn capsule(half_height: f32, radius: f32) -> Self {
        Self::CapsuleY { half_height, radius }
    }

    /// Whether the shape can be swept and used as a query shape
    pub fn is_convex(&self) -> bool {
        !matches!(self, Self::TriMesh { .. } | Self::HeightField { .. })
    }

    /// Build the parry shape
    pub fn build(&self) -> Result<SharedShape> {
        let shape = match self {
            Self::Sphere { radius } => SharedShape::ball(*radius),
            Self::Box { half_extents } => {
                SharedShape::cuboid(half_extents[0], half_extents[1], half_extents[2])
            }
            Self::CapsuleY { half_height, radius } => SharedShape::capsule_y(*half_height, *radius),
            Self::CylinderY { half_height, radius } => SharedShape::cylinder(*half_height, *radius),
            Self::ConeY { half_height, radius } => SharedShape::cone(*half_height, *radius),
            Self::ConvexHull { points } => {
                let points: Vec<Point<Real>> =
                    points.iter().map(|p| Point::new(p[0], p[1], p[2])).collect();
                SharedShape::convex_hull(&points).ok_or_else(|| {
                    SpaceError::ShapeCreationFailed(format!(
                        "degenerate convex hull from {} points",
                        points.len()
                    ))
                })?
            }
            Self::TriMesh { vertices, indices } => {
                if vertices.is_empty() || indices.is_empty() {
                    return Err(SpaceError::ShapeCreationFailed("empty triangle mesh".to_string()));
                }
                let vertices: Vec<Point<Real>> =
                    vertices.iter().map(|v| Point::new(v[0], v[1], v[2])).collect();
                SharedShape::trimesh(vertices, indices.clone())
            }
            Self::HeightField {
                heights,
                rows,
                cols,
                scale,
            } => {
                if heights.len() != rows * cols {
                    return Err(SpaceError::ShapeCreationFailed(format!(
                        "heightfield expects {} samples, got {}",
                        rows * cols,
                        heights.len()
                    )));
                }
                let matrix = DMatrix::from_row_slice(*rows, *cols, heights);
                SharedShape::heightfield(matrix, Vector::new(scale[0], scale[1], scale[2]))
            }
        };
        Ok(shape)
    }
}
