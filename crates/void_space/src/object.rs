//! Collision objects: bodies and areas owned by a space

use crate::error::Result;
use crate::layers::CollisionGroups;
use crate::shape::ColliderShape;
use rapier3d::parry::bounding_volume::Aabb;
use rapier3d::parry::math::{Isometry, Point, Real, Vector};
use rapier3d::parry::shape::SharedShape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Space-local identity of a collision object.
///
/// `Rid::default()` is never handed out by a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid(pub(crate) u64);

impl Rid {
    /// Create from a raw id
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid#{}", self.0)
    }
}

/// Identity of the engine-side instance that owns an object (entity, node, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

/// How a body is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyMode {
    /// Never moves
    Static,
    /// Moved by user code through motion tests
    #[default]
    Kinematic,
    /// Fully simulated
    Rigid,
    /// Simulated without rotation
    Character,
}

/// Body-only state
#[derive(Debug, Clone, PartialEq)]
pub struct BodyState {
    /// Drive mode
    pub mode: BodyMode,
    /// Linear velocity
    pub linear_velocity: Vector<Real>,
    /// Angular velocity
    pub angular_velocity: Vector<Real>,
    /// Objects this body never collides with
    pub exceptions: BTreeSet<Rid>,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            mode: BodyMode::default(),
            linear_velocity: Vector::zeros(),
            angular_velocity: Vector::zeros(),
            exceptions: BTreeSet::new(),
        }
    }
}

impl BodyState {
    /// Velocity of the point `point` rigidly attached to a body whose origin is `origin`
    pub fn velocity_at_point(&self, origin: &Point<Real>, point: &Point<Real>) -> Vector<Real> {
        self.linear_velocity + self.angular_velocity.cross(&(point - origin))
    }
}

/// What kind of collision object this is
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// A body that blocks motion
    Body(BodyState),
    /// A detection volume; never blocks motion
    Area,
}

impl ObjectKind {
    /// Create a kinematic body kind
    pub fn body() -> Self {
        Self::Body(BodyState::default())
    }

    /// Create a static body kind
    pub fn static_body() -> Self {
        Self::Body(BodyState {
            mode: BodyMode::Static,
            ..Default::default()
        })
    }

    /// Whether this is a body
    pub fn is_body(&self) -> bool {
        matches!(self, Self::Body(_))
    }

    /// Whether this is an area
    pub fn is_area(&self) -> bool {
        matches!(self, Self::Area)
    }
}

/// One shape attached to an object
#[derive(Clone)]
pub struct ShapeSlot {
    /// Geometry
    pub shape: SharedShape,
    /// Transform relative to the owning object
    pub transform: Isometry<Real>,
    /// Whether the shape is skipped by every query and motion test
    pub disabled: bool,
}

impl ShapeSlot {
    /// Create an enabled slot
    pub fn new(shape: SharedShape, transform: Isometry<Real>) -> Self {
        Self {
            shape,
            transform,
            disabled: false,
        }
    }
}

impl fmt::Debug for ShapeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeSlot")
            .field("shape_type", &self.shape.shape_type())
            .field("transform", &self.transform)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// A body or area registered in a space
#[derive(Debug, Clone)]
pub struct CollisionObject {
    pub(crate) self_id: Rid,
    instance_id: Option<InstanceId>,
    user_data: u128,
    kind: ObjectKind,
    shapes: Vec<ShapeSlot>,
    transform: Isometry<Real>,
    groups: CollisionGroups,
    ray_pickable: bool,
}

impl CollisionObject {
    pub(crate) fn from_desc(self_id: Rid, desc: CollisionObjectDesc, shapes: Vec<ShapeSlot>) -> Self {
        Self {
            self_id,
            instance_id: desc.instance_id,
            user_data: desc.user_data,
            kind: desc.kind,
            shapes,
            transform: desc.transform,
            groups: desc.groups,
            ray_pickable: desc.ray_pickable,
        }
    }

    /// Identity within the space
    pub fn self_id(&self) -> Rid {
        self.self_id
    }

    /// Owning engine instance
    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance_id
    }

    /// User data (entity id, ...)
    pub fn user_data(&self) -> u128 {
        self.user_data
    }

    /// Body or area
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Body state if this is a body
    pub fn body(&self) -> Option<&BodyState> {
        match &self.kind {
            ObjectKind::Body(state) => Some(state),
            ObjectKind::Area => None,
        }
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut BodyState> {
        match &mut self.kind {
            ObjectKind::Body(state) => Some(state),
            ObjectKind::Area => None,
        }
    }

    /// World transform
    pub fn transform(&self) -> &Isometry<Real> {
        &self.transform
    }

    pub(crate) fn set_transform(&mut self, transform: Isometry<Real>) {
        self.transform = transform;
    }

    /// Layer and mask
    pub fn groups(&self) -> CollisionGroups {
        self.groups
    }

    pub(crate) fn set_groups(&mut self, groups: CollisionGroups) {
        self.groups = groups;
    }

    /// Collision layer bits
    pub fn collision_layer(&self) -> u32 {
        self.groups.layer
    }

    /// Collision mask bits
    pub fn collision_mask(&self) -> u32 {
        self.groups.mask
    }

    /// Whether rays cast with picking enabled can hit this object
    pub fn is_ray_pickable(&self) -> bool {
        self.ray_pickable
    }

    /// Number of shapes, enabled or not
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Shape slot at `index`
    pub fn shape_slot(&self, index: usize) -> Option<&ShapeSlot> {
        self.shapes.get(index)
    }

    pub(crate) fn shape_slot_mut(&mut self, index: usize) -> Option<&mut ShapeSlot> {
        self.shapes.get_mut(index)
    }

    pub(crate) fn push_shape(&mut self, slot: ShapeSlot) -> usize {
        self.shapes.push(slot);
        self.shapes.len() - 1
    }

    /// Geometry at `index`
    pub fn shape(&self, index: usize) -> Option<&SharedShape> {
        self.shapes.get(index).map(|s| &s.shape)
    }

    /// Local transform of the shape at `index`
    pub fn shape_transform(&self, index: usize) -> Option<&Isometry<Real>> {
        self.shapes.get(index).map(|s| &s.transform)
    }

    /// Out-of-range indices read as disabled
    pub fn is_shape_disabled(&self, index: usize) -> bool {
        self.shapes.get(index).map_or(true, |s| s.disabled)
    }

    /// Enabled shapes with their indices, in order
    pub fn enabled_shapes(&self) -> impl Iterator<Item = (usize, &ShapeSlot)> {
        self.shapes.iter().enumerate().filter(|(_, s)| !s.disabled)
    }

    /// World transform of the shape at `index` when the object sits at `transform`
    pub fn shape_world_transform_at(&self, transform: &Isometry<Real>, index: usize) -> Option<Isometry<Real>> {
        self.shape_transform(index).map(|local| transform * local)
    }

    /// World transform of the shape at `index`
    pub fn shape_world_transform(&self, index: usize) -> Option<Isometry<Real>> {
        self.shape_world_transform_at(&self.transform, index)
    }

    /// World AABB of the shape at `index`
    pub fn shape_aabb(&self, index: usize) -> Option<Aabb> {
        let slot = self.shapes.get(index)?;
        Some(slot.shape.compute_aabb(&(self.transform * slot.transform)))
    }

    /// Symmetric layer/mask test against another object
    pub fn test_collision_mask(&self, other: &CollisionObject) -> bool {
        self.groups.interacts_with(&other.groups)
    }

    /// Whether either object lists the other as a collision exception
    pub fn has_exception_with(&self, other: &CollisionObject) -> bool {
        let excepts = |a: &CollisionObject, b: Rid| a.body().is_some_and(|s| s.exceptions.contains(&b));
        excepts(self, other.self_id) || excepts(other, self.self_id)
    }

    /// Velocity of a world point as carried by this object; zero for areas
    pub fn velocity_at_point(&self, point: &Point<Real>) -> Vector<Real> {
        match &self.kind {
            ObjectKind::Body(state) => {
                state.velocity_at_point(&Point::from(self.transform.translation.vector), point)
            }
            ObjectKind::Area => Vector::zeros(),
        }
    }
}

/// Description for registering a collision object
#[derive(Debug, Clone)]
pub struct CollisionObjectDesc {
    /// Body or area
    pub kind: ObjectKind,
    /// Shapes with their local transforms
    pub shapes: Vec<(ColliderShape, Isometry<Real>)>,
    /// Initial world transform
    pub transform: Isometry<Real>,
    /// Layer and mask
    pub groups: CollisionGroups,
    /// Hit by picking rays
    pub ray_pickable: bool,
    /// Owning engine instance
    pub instance_id: Option<InstanceId>,
    /// User data
    pub user_data: u128,
}

impl Default for CollisionObjectDesc {
    fn default() -> Self {
        Self {
            kind: ObjectKind::body(),
            shapes: Vec::new(),
            transform: Isometry::identity(),
            groups: CollisionGroups::default(),
            ray_pickable: true,
            instance_id: None,
            user_data: 0,
        }
    }
}

impl CollisionObjectDesc {
    /// Describe a kinematic body
    pub fn body() -> Self {
        Self::default()
    }

    /// Describe a static body
    pub fn static_body() -> Self {
        Self {
            kind: ObjectKind::static_body(),
            ..Default::default()
        }
    }

    /// Describe an area
    pub fn area() -> Self {
        Self {
            kind: ObjectKind::Area,
            ray_pickable: false,
            ..Default::default()
        }
    }

    /// Add a shape at the object origin
    pub fn with_shape(self, shape: ColliderShape) -> Self {
        self.with_shape_at(shape, Isometry::identity())
    }

    /// Add a shape with a local transform
    pub fn with_shape_at(mut self, shape: ColliderShape, local: Isometry<Real>) -> Self {
        self.shapes.push((shape, local));
        self
    }

    /// Set world position
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.translation.vector = Vector::new(x, y, z);
        self
    }

    /// Set world transform
    pub fn with_transform(mut self, transform: Isometry<Real>) -> Self {
        self.transform = transform;
        self
    }

    /// Set collision groups
    pub fn with_groups(mut self, groups: CollisionGroups) -> Self {
        self.groups = groups;
        self
    }

    /// Set ray pickability
    pub fn with_ray_pickable(mut self, pickable: bool) -> Self {
        self.ray_pickable = pickable;
        self
    }

    /// Set body velocities; ignored for areas
    pub fn with_velocity(mut self, linear: Vector<Real>, angular: Vector<Real>) -> Self {
        if let ObjectKind::Body(state) = &mut self.kind {
            state.linear_velocity = linear;
            state.angular_velocity = angular;
        }
        self
    }

    /// Set owning instance
    pub fn with_instance_id(mut self, id: InstanceId) -> Self {
        self.instance_id = Some(id);
        self
    }

    /// Set user data
    pub fn with_user_data(mut self, data: u128) -> Self {
        self.user_data = data;
        self
    }

    pub(crate) fn build_shapes(&self) -> Result<Vec<ShapeSlot>> {
        self.shapes
            .iter()
            .map(|(shape, local)| Ok(ShapeSlot::new(shape.build()?, *local)))
            .collect()
    }
}
