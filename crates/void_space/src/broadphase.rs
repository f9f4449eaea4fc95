//! Broadphase: coarse candidate culling by bounding boxes

use crate::object::Rid;
use crate::scratch::{CullBuffer, ShapeKey};
use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::parry::math::{Point, Real};
use rapier3d::parry::query::{Ray, RayCast};
use std::collections::BTreeMap;

/// Spatial index of shape proxies.
///
/// Culling appends candidates to `out` (which the caller has cleared) and
/// must be deterministic: an unchanged index returns the same candidates in
/// the same order for the same input.
pub trait Broadphase: Send + Sync {
    /// Insert or move the proxy for `key`
    fn upsert(&mut self, key: ShapeKey, aabb: Aabb);

    /// Remove the proxy for `key` if present
    fn remove(&mut self, key: ShapeKey);

    /// Remove every proxy belonging to `object`
    fn remove_object(&mut self, object: Rid);

    /// Proxies whose box contains `point`
    fn cull_point(&self, point: &Point<Real>, out: &mut CullBuffer);

    /// Proxies whose box the segment `from..to` touches
    fn cull_segment(&self, from: &Point<Real>, to: &Point<Real>, out: &mut CullBuffer);

    /// Proxies whose box overlaps `aabb`
    fn cull_aabb(&self, aabb: &Aabb, out: &mut CullBuffer);

    /// Number of proxies
    fn len(&self) -> usize;

    /// Whether there are no proxies
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Linear scan over every proxy in key order.
///
/// Serves as the determinism baseline: candidates always come back sorted by
/// `(object, shape)`, inclusive on touching faces.
#[derive(Debug, Default)]
pub struct BruteForceBroadphase {
    proxies: BTreeMap<ShapeKey, Aabb>,
}

impl BruteForceBroadphase {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored box for `key`
    pub fn proxy(&self, key: ShapeKey) -> Option<&Aabb> {
        self.proxies.get(&key)
    }

    fn cull_with(&self, out: &mut CullBuffer, mut hit: impl FnMut(&Aabb) -> bool) {
        for (key, aabb) in &self.proxies {
            if hit(aabb) && !out.push(*key) {
                log::warn!(
                    "broadphase candidate buffer saturated at {} entries",
                    out.capacity()
                );
                break;
            }
        }
    }
}

impl Broadphase for BruteForceBroadphase {
    fn upsert(&mut self, key: ShapeKey, aabb: Aabb) {
        self.proxies.insert(key, aabb);
    }

    fn remove(&mut self, key: ShapeKey) {
        self.proxies.remove(&key);
    }

    fn remove_object(&mut self, object: Rid) {
        self.proxies.retain(|key, _| key.object != object);
    }

    fn cull_point(&self, point: &Point<Real>, out: &mut CullBuffer) {
        self.cull_with(out, |aabb| aabb.contains_local_point(point));
    }

    fn cull_segment(&self, from: &Point<Real>, to: &Point<Real>, out: &mut CullBuffer) {
        let dir = to - from;
        if dir.norm_squared() == 0.0 {
            self.cull_point(from, out);
            return;
        }
        let ray = Ray::new(*from, dir);
        self.cull_with(out, |aabb| {
            aabb.contains_local_point(from) || aabb.intersects_local_ray(&ray, 1.0)
        });
    }

    fn cull_aabb(&self, aabb: &Aabb, out: &mut CullBuffer) {
        self.cull_with(out, |proxy| proxy.intersects(aabb));
    }

    fn len(&self) -> usize {
        self.proxies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32) -> Aabb {
        Aabb::new(Point::new(x - 0.5, -0.5, -0.5), Point::new(x + 0.5, 0.5, 0.5))
    }

    fn keys(out: &CullBuffer) -> Vec<u64> {
        out.as_slice().iter().map(|k| k.object.raw()).collect()
    }

    #[test]
    fn test_cull_point_and_aabb() {
        let mut bp = BruteForceBroadphase::new();
        bp.upsert(ShapeKey::new(Rid(2), 0), unit_box(0.0));
        bp.upsert(ShapeKey::new(Rid(1), 0), unit_box(3.0));

        let mut out = CullBuffer::with_capacity(8);
        bp.cull_point(&Point::new(3.2, 0.0, 0.0), &mut out);
        assert_eq!(keys(&out), vec![1]);

        out.clear();
        bp.cull_aabb(&Aabb::new(Point::new(-1.0, -1.0, -1.0), Point::new(4.0, 1.0, 1.0)), &mut out);
        // BTreeMap order, not insertion order
        assert_eq!(keys(&out), vec![1, 2]);
    }

    #[test]
    fn test_cull_segment() {
        let mut bp = BruteForceBroadphase::new();
        bp.upsert(ShapeKey::new(Rid(1), 0), unit_box(0.0));
        bp.upsert(ShapeKey::new(Rid(2), 0), unit_box(5.0));

        let mut out = CullBuffer::with_capacity(8);
        bp.cull_segment(&Point::new(-2.0, 0.0, 0.0), &Point::new(2.0, 0.0, 0.0), &mut out);
        assert_eq!(keys(&out), vec![1]);

        out.clear();
        bp.cull_segment(&Point::new(5.0, 0.0, 0.0), &Point::new(5.0, 0.0, 0.0), &mut out);
        assert_eq!(keys(&out), vec![2]);
    }

    #[test]
    fn test_remove_object_drops_all_shapes() {
        let mut bp = BruteForceBroadphase::new();
        bp.upsert(ShapeKey::new(Rid(1), 0), unit_box(0.0));
        bp.upsert(ShapeKey::new(Rid(1), 1), unit_box(1.0));
        bp.upsert(ShapeKey::new(Rid(2), 0), unit_box(2.0));
        bp.remove_object(Rid(1));
        assert_eq!(bp.len(), 1);
        assert!(bp.proxy(ShapeKey::new(Rid(2), 0)).is_some());
    }
}
