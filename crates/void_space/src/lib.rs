//! Void Space - collision queries and kinematic motion
//!
//! This crate answers geometric questions about a physics space and moves
//! kinematic bodies through it without tunneling.
//!
//! # Features
//!
//! - Point, ray and shape intersection queries
//! - Shape casting with time-of-impact bisection
//! - Rest info (deepest contact) queries
//! - Body motion tests with stuck recovery
//! - Collision layers, masks and exceptions
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                      Space                       │
//! │  ┌──────────────┐  ┌────────────┐  ┌───────────┐ │
//! │  │ObjectRegistry│  │ Broadphase │  │NarrowPhase│ │
//! │  └──────────────┘  └────────────┘  └───────────┘ │
//! │  ┌──────────────────────────────────────────────┐│
//! │  │        ScratchPool (candidate buffers)       ││
//! │  └──────────────────────────────────────────────┘│
//! └──────────────────────────────────────────────────┘
//!                         │
//!          ┌──────────────┴──────────────┐
//!          ▼                             ▼
//!   ┌──────────────────┐       ┌───────────────────┐
//!   │ DirectSpaceState │       │ test_body_motion  │
//!   │ point/ray/shape  │       │ recover, sweep,   │
//!   │ cast, rest info  │       │ contact, assemble │
//!   └──────────────────┘       └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use void_space::prelude::*;
//!
//! let mut space = Space::new(SpaceConfig::default())?;
//!
//! let wall = space.add_object(
//!     CollisionObjectDesc::static_body()
//!         .with_position(3.0, 0.0, 0.0)
//!         .with_shape(ColliderShape::cuboid(0.5, 0.5, 0.5)),
//! )?;
//! let mover = space.add_object(
//!     CollisionObjectDesc::body().with_shape(ColliderShape::cuboid(0.5, 0.5, 0.5)),
//! )?;
//!
//! let params = MotionParameters::new(Isometry::identity(), Vector::new(4.0, 0.0, 0.0));
//! let mut result = MotionResult::default();
//! if space.test_body_motion(mover, &params, &mut result)? {
//!     assert_eq!(result.collider, Some(wall));
//! }
//! ```

pub mod broadphase;
pub mod config;
pub mod error;
pub mod layers;
pub mod motion;
pub mod narrow_phase;
pub mod object;
pub mod query;
pub mod registry;
pub mod scratch;
pub mod shape;
pub mod space;

pub mod prelude {
    //! Common imports for space queries and motion
    pub use crate::broadphase::{Broadphase, BruteForceBroadphase};
    pub use crate::config::SpaceConfig;
    pub use crate::error::{Result, SpaceError};
    pub use crate::layers::{CollisionGroups, CollisionLayer};
    pub use crate::motion::{MotionParameters, MotionResult};
    pub use crate::narrow_phase::{ContactPoint, Distance, NarrowPhase, ParryNarrowPhase};
    pub use crate::object::{BodyMode, CollisionObject, CollisionObjectDesc, InstanceId, ObjectKind, Rid};
    pub use crate::query::{DirectSpaceState, MotionCast, QueryFilter, RayResult, ShapeRestInfo, ShapeResult};
    pub use crate::shape::ColliderShape;
    pub use crate::space::Space;
    pub use rapier3d::parry::math::{Isometry, Point, Real, Vector};
}

pub use prelude::*;
