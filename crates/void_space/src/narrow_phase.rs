//! Narrow phase: exact shape-pair contact and distance tests

use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::parry::math::{Isometry, Point, Real, Vector};
use rapier3d::parry::query::{self, ClosestPoints, ShapeCastOptions};
use rapier3d::parry::shape::Shape;
use std::ops::ControlFlow;

/// Contact between a shape A and a shape B, in world space.
///
/// `normal` points from A toward B and `depth` is the signed separation of
/// the margin-grown shapes (negative when penetrating), so that
/// `point_b - point_a == normal * depth`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Point on the (grown) surface of A
    pub point_a: Point<Real>,
    /// Point on the surface of B
    pub point_b: Point<Real>,
    /// Unit normal from A toward B
    pub normal: Vector<Real>,
    /// Signed separation
    pub depth: Real,
}

impl ContactPoint {
    /// Vector that moves A's contact point onto B's
    pub fn separation(&self) -> Vector<Real> {
        self.point_b - self.point_a
    }

    /// Length of the separation vector
    pub fn separation_length(&self) -> Real {
        self.separation().norm()
    }
}

/// Outcome of a distance test
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    /// Shapes are apart; closest points on A and on B
    Separated {
        /// Closest point on A
        point_a: Point<Real>,
        /// Closest point on B
        point_b: Point<Real>,
    },
    /// Shapes touch or overlap
    Overlapping,
}

impl Distance {
    /// Whether the shapes overlap
    pub fn is_overlapping(&self) -> bool {
        matches!(self, Self::Overlapping)
    }
}

/// Exact pairwise geometry
pub trait NarrowPhase: Send + Sync {
    /// Overlap test of A, grown by `margin`, against B.
    ///
    /// Every contact found is passed to `on_contact`, which may stop the
    /// enumeration early. Returns true when the shapes overlap.
    fn solve_static(
        &self,
        shape_a: &dyn Shape,
        xform_a: &Isometry<Real>,
        shape_b: &dyn Shape,
        xform_b: &Isometry<Real>,
        margin: Real,
        on_contact: &mut dyn FnMut(&ContactPoint) -> ControlFlow<()>,
    ) -> bool;

    /// Distance between A swept along `motion_a` and a static B.
    ///
    /// `aabb` bounds the region of interest (the sweep volume); `sep_axis`
    /// is a warm-start hint and receives the separating direction found.
    /// A sweep that only comes to touch B at the end of the motion is
    /// separated.
    #[allow(clippy::too_many_arguments)]
    fn solve_distance(
        &self,
        shape_a: &dyn Shape,
        xform_a: &Isometry<Real>,
        motion_a: &Vector<Real>,
        shape_b: &dyn Shape,
        xform_b: &Isometry<Real>,
        aabb: &Aabb,
        sep_axis: &mut Vector<Real>,
    ) -> Distance;
}

/// Distance a sweep may still travel past its first contact and count as
/// merely touching B at the end of the motion
const END_CONTACT_SLOP: Real = 1.0e-4;

/// Narrow phase backed by parry's query dispatcher.
///
/// Each shape pair yields at most one contact (the deepest).
#[derive(Debug, Clone, Copy, Default)]
pub struct ParryNarrowPhase;

impl ParryNarrowPhase {
    /// Create the narrow phase
    pub fn new() -> Self {
        Self
    }

    fn closest(
        shape_a: &dyn Shape,
        xform_a: &Isometry<Real>,
        shape_b: &dyn Shape,
        xform_b: &Isometry<Real>,
        sep_axis: &mut Vector<Real>,
    ) -> Distance {
        match query::closest_points(xform_a, shape_a, xform_b, shape_b, Real::MAX) {
            Ok(ClosestPoints::Intersecting) => Distance::Overlapping,
            Ok(ClosestPoints::WithinMargin(point_a, point_b)) => {
                let axis = point_a - point_b;
                let len = axis.norm();
                if len > 0.0 {
                    *sep_axis = axis / len;
                    Distance::Separated { point_a, point_b }
                } else {
                    Distance::Overlapping
                }
            }
            Ok(ClosestPoints::Disjoint) => Distance::Separated {
                point_a: Point::from(xform_a.translation.vector),
                point_b: Point::from(xform_b.translation.vector),
            },
            Err(_) => {
                log::warn!(
                    "closest points unsupported for {:?} / {:?}",
                    shape_a.shape_type(),
                    shape_b.shape_type()
                );
                Distance::Separated {
                    point_a: Point::from(xform_a.translation.vector),
                    point_b: Point::from(xform_b.translation.vector),
                }
            }
        }
    }
}

impl NarrowPhase for ParryNarrowPhase {
    fn solve_static(
        &self,
        shape_a: &dyn Shape,
        xform_a: &Isometry<Real>,
        shape_b: &dyn Shape,
        xform_b: &Isometry<Real>,
        margin: Real,
        on_contact: &mut dyn FnMut(&ContactPoint) -> ControlFlow<()>,
    ) -> bool {
        let contact = match query::contact(xform_a, shape_a, xform_b, shape_b, margin) {
            Ok(Some(contact)) => contact,
            Ok(None) => return false,
            Err(_) => {
                log::warn!(
                    "contact unsupported for {:?} / {:?}",
                    shape_a.shape_type(),
                    shape_b.shape_type()
                );
                return false;
            }
        };

        let normal = contact.normal1.into_inner();
        let point = ContactPoint {
            point_a: contact.point1 + normal * margin,
            point_b: contact.point2,
            normal,
            depth: contact.dist - margin,
        };
        let _ = on_contact(&point);
        true
    }

    fn solve_distance(
        &self,
        shape_a: &dyn Shape,
        xform_a: &Isometry<Real>,
        motion_a: &Vector<Real>,
        shape_b: &dyn Shape,
        xform_b: &Isometry<Real>,
        aabb: &Aabb,
        sep_axis: &mut Vector<Real>,
    ) -> Distance {
        if motion_a.norm_squared() == 0.0 {
            return Self::closest(shape_a, xform_a, shape_b, xform_b, sep_axis);
        }

        // B outside the sweep volume cannot be hit
        if aabb.intersects(&shape_b.compute_aabb(xform_b)) {
            let options = ShapeCastOptions {
                max_time_of_impact: 1.0,
                target_distance: 0.0,
                stop_at_penetration: true,
                compute_impact_geometry_on_penetration: false,
            };
            match query::cast_shapes(
                xform_a,
                motion_a,
                shape_a,
                xform_b,
                &Vector::zeros(),
                shape_b,
                options,
            ) {
                Ok(Some(hit)) => {
                    let reach = (1.0 - hit.time_of_impact) * motion_a.norm();
                    if reach > END_CONTACT_SLOP {
                        return Distance::Overlapping;
                    }
                    // First contact at the end pose: touching, not blocked
                    let mut end = *xform_a;
                    end.translation.vector += motion_a;
                    if let Distance::Separated { point_a, point_b } =
                        Self::closest(shape_a, &end, shape_b, xform_b, sep_axis)
                    {
                        return Distance::Separated { point_a, point_b };
                    }
                    let mut at_impact = *xform_a;
                    at_impact.translation.vector += motion_a * hit.time_of_impact;
                    *sep_axis = -(at_impact * hit.normal1.into_inner());
                    return Distance::Separated {
                        point_a: at_impact * hit.witness1,
                        point_b: xform_b * hit.witness2,
                    };
                }
                Ok(None) => {}
                Err(_) => {
                    log::warn!(
                        "shape cast unsupported for {:?} / {:?}",
                        shape_a.shape_type(),
                        shape_b.shape_type()
                    );
                }
            }
        }

        let mut end = *xform_a;
        end.translation.vector += motion_a;
        Self::closest(shape_a, &end, shape_b, xform_b, sep_axis)
    }
}
