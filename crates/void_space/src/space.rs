//! Space - owner of collision objects and entry point for queries

use crate::broadphase::{Broadphase, BruteForceBroadphase};
use crate::config::SpaceConfig;
use crate::error::{Result, SpaceError};
use crate::layers::CollisionGroups;
use crate::motion::{MotionParameters, MotionResult};
use crate::narrow_phase::{NarrowPhase, ParryNarrowPhase};
use crate::object::{CollisionObject, CollisionObjectDesc, Rid, ShapeSlot};
use crate::query::DirectSpaceState;
use crate::registry::ObjectRegistry;
use crate::scratch::{ScratchPool, ShapeKey};
use crate::shape::ColliderShape;
use rapier3d::parry::math::{Isometry, Real, Vector};

/// A collision space: objects, their broadphase proxies and query scratch state
pub struct Space {
    /// Configuration
    pub(crate) config: SpaceConfig,

    /// Every collision object
    pub(crate) registry: ObjectRegistry,

    /// Shape proxies
    pub(crate) broadphase: Box<dyn Broadphase>,

    /// Exact pair tests
    pub(crate) narrow_phase: Box<dyn NarrowPhase>,

    /// Candidate buffers handed to direct states
    pub(crate) scratch: ScratchPool,

    /// Set while the owner is mid-step
    locked: bool,
}

impl Space {
    /// Create a space with the default backends
    pub fn new(config: SpaceConfig) -> Result<Self> {
        Self::with_backends(
            config,
            Box::new(BruteForceBroadphase::new()),
            Box::new(ParryNarrowPhase::new()),
        )
    }

    /// Create a space with custom backends
    pub fn with_backends(
        config: SpaceConfig,
        broadphase: Box<dyn Broadphase>,
        narrow_phase: Box<dyn NarrowPhase>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, broadphase, narrow_phase))
    }

    fn assemble(
        config: SpaceConfig,
        broadphase: Box<dyn Broadphase>,
        narrow_phase: Box<dyn NarrowPhase>,
    ) -> Self {
        let scratch = ScratchPool::new(config.intersection_query_max);
        Self {
            config,
            registry: ObjectRegistry::new(),
            broadphase,
            narrow_phase,
            scratch,
            locked: false,
        }
    }

    /// Get the space configuration
    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    // ==================== Locking ====================

    /// Refuse structural access until [`Space::unlock`]
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Allow structural access again
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Whether the space is locked
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            Err(SpaceError::SpaceLocked)
        } else {
            Ok(())
        }
    }

    // ==================== Objects ====================

    /// Register a body or area
    pub fn add_object(&mut self, desc: CollisionObjectDesc) -> Result<Rid> {
        self.ensure_unlocked()?;
        let rid = self.registry.insert(desc)?;
        self.refresh_proxies(rid)?;
        log::debug!("added {rid} to space");
        Ok(rid)
    }

    /// Unregister an object
    pub fn remove_object(&mut self, rid: Rid) -> Result<CollisionObject> {
        self.ensure_unlocked()?;
        let object = self.registry.remove(rid)?;
        self.broadphase.remove_object(rid);
        log::debug!("removed {rid} from space");
        Ok(object)
    }

    /// Move an object
    pub fn set_transform(&mut self, rid: Rid, transform: Isometry<Real>) -> Result<()> {
        self.ensure_unlocked()?;
        self.registry.try_get_mut(rid)?.set_transform(transform);
        self.refresh_proxies(rid)
    }

    /// Attach a shape; returns its index
    pub fn add_shape(&mut self, rid: Rid, shape: ColliderShape, local: Isometry<Real>) -> Result<usize> {
        self.ensure_unlocked()?;
        let slot = ShapeSlot::new(shape.build()?, local);
        let index = self.registry.try_get_mut(rid)?.push_shape(slot);
        self.refresh_proxies(rid)?;
        Ok(index)
    }

    /// Enable or disable one shape
    pub fn set_shape_disabled(&mut self, rid: Rid, index: usize, disabled: bool) -> Result<()> {
        self.ensure_unlocked()?;
        self.shape_slot_mut(rid, index)?.disabled = disabled;
        self.refresh_proxies(rid)
    }

    /// Change one shape's local transform
    pub fn set_shape_transform(&mut self, rid: Rid, index: usize, local: Isometry<Real>) -> Result<()> {
        self.ensure_unlocked()?;
        self.shape_slot_mut(rid, index)?.transform = local;
        self.refresh_proxies(rid)
    }

    /// Change collision layer and mask
    pub fn set_collision_groups(&mut self, rid: Rid, groups: CollisionGroups) -> Result<()> {
        self.ensure_unlocked()?;
        self.registry.try_get_mut(rid)?.set_groups(groups);
        Ok(())
    }

    /// Set a body's velocities
    pub fn set_body_velocity(&mut self, rid: Rid, linear: Vector<Real>, angular: Vector<Real>) -> Result<()> {
        self.ensure_unlocked()?;
        let body = self
            .registry
            .try_get_mut(rid)?
            .body_mut()
            .ok_or(SpaceError::NotABody(rid))?;
        body.linear_velocity = linear;
        body.angular_velocity = angular;
        Ok(())
    }

    /// Stop `rid` from colliding with `other` in motion tests
    pub fn add_collision_exception(&mut self, rid: Rid, other: Rid) -> Result<()> {
        self.ensure_unlocked()?;
        self.registry.try_get(other)?;
        self.registry
            .try_get_mut(rid)?
            .body_mut()
            .ok_or(SpaceError::NotABody(rid))?
            .exceptions
            .insert(other);
        Ok(())
    }

    /// Undo [`Space::add_collision_exception`]
    pub fn remove_collision_exception(&mut self, rid: Rid, other: Rid) -> Result<()> {
        self.ensure_unlocked()?;
        self.registry
            .try_get_mut(rid)?
            .body_mut()
            .ok_or(SpaceError::NotABody(rid))?
            .exceptions
            .remove(&other);
        Ok(())
    }

    /// Look up an object
    pub fn object(&self, rid: Rid) -> Option<&CollisionObject> {
        self.registry.get(rid)
    }

    /// All objects in RID order
    pub fn objects(&self) -> impl Iterator<Item = &CollisionObject> {
        self.registry.iter()
    }

    /// Number of objects
    pub fn object_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of broadphase proxies (enabled shapes)
    pub fn proxy_count(&self) -> usize {
        self.broadphase.len()
    }

    fn shape_slot_mut(&mut self, rid: Rid, index: usize) -> Result<&mut ShapeSlot> {
        self.registry
            .try_get_mut(rid)?
            .shape_slot_mut(index)
            .ok_or(SpaceError::ShapeIndexOutOfRange { object: rid, index })
    }

    fn refresh_proxies(&mut self, rid: Rid) -> Result<()> {
        let object = self.registry.try_get(rid)?;
        self.broadphase.remove_object(rid);
        for (index, _) in object.enabled_shapes() {
            if let Some(aabb) = object.shape_aabb(index) {
                self.broadphase.upsert(ShapeKey::new(rid, index), aabb);
            }
        }
        Ok(())
    }

    // ==================== Queries ====================

    /// Read-only query access; available while locked
    pub fn direct_state(&self) -> DirectSpaceState<'_> {
        DirectSpaceState::new(self)
    }

    /// Resolve the motion of body `rid`; returns whether it collided
    pub fn test_body_motion(
        &self,
        rid: Rid,
        params: &MotionParameters,
        result: &mut MotionResult,
    ) -> Result<bool> {
        self.ensure_unlocked()?;
        self.direct_state().test_body_motion(rid, params, result)
    }
}

impl Default for Space {
    fn default() -> Self {
        Self::assemble(
            SpaceConfig::default(),
            Box::new(BruteForceBroadphase::new()),
            Box::new(ParryNarrowPhase::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_at(x: f32) -> CollisionObjectDesc {
        CollisionObjectDesc::static_body()
            .with_position(x, 0.0, 0.0)
            .with_shape(ColliderShape::cuboid(0.5, 0.5, 0.5))
    }

    #[test]
    fn test_space_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Space>();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SpaceConfig::default().with_depenetration_speed(0.0);
        assert!(matches!(Space::new(config), Err(SpaceError::InvalidConfig(_))));
    }

    #[test]
    fn test_proxies_follow_shapes() {
        let mut space = Space::default();
        let rid = space.add_object(cube_at(0.0)).unwrap();
        assert_eq!(space.proxy_count(), 1);

        let index = space
            .add_shape(rid, ColliderShape::sphere(0.25), Isometry::translation(0.0, 1.0, 0.0))
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(space.proxy_count(), 2);

        space.set_shape_disabled(rid, 0, true).unwrap();
        assert_eq!(space.proxy_count(), 1);
        assert_eq!(
            space.set_shape_disabled(rid, 5, true),
            Err(SpaceError::ShapeIndexOutOfRange { object: rid, index: 5 })
        );

        space.remove_object(rid).unwrap();
        assert_eq!(space.proxy_count(), 0);
        assert_eq!(space.object_count(), 0);
    }

    #[test]
    fn test_locked_space_refuses_mutation() {
        let mut space = Space::default();
        let rid = space.add_object(cube_at(0.0)).unwrap();
        space.lock();
        assert!(space.is_locked());
        assert_eq!(space.add_object(cube_at(2.0)), Err(SpaceError::SpaceLocked));
        assert_eq!(
            space.set_transform(rid, Isometry::translation(1.0, 0.0, 0.0)),
            Err(SpaceError::SpaceLocked)
        );
        space.unlock();
        space.set_transform(rid, Isometry::translation(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(space.object(rid).unwrap().transform().translation.vector.x, 1.0);
    }

    #[test]
    fn test_area_velocity_and_exceptions_are_rejected() {
        let mut space = Space::default();
        let area = space.add_object(CollisionObjectDesc::area()).unwrap();
        let body = space.add_object(cube_at(0.0)).unwrap();
        assert_eq!(
            space.set_body_velocity(area, Vector::x(), Vector::zeros()),
            Err(SpaceError::NotABody(area))
        );
        assert_eq!(
            space.add_collision_exception(area, body),
            Err(SpaceError::NotABody(area))
        );
        space.add_collision_exception(body, area).unwrap();
        assert!(space.object(body).unwrap().body().unwrap().exceptions.contains(&area));
    }
}
