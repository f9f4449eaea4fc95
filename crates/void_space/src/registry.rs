//! Owner of every collision object in a space

use crate::error::{Result, SpaceError};
use crate::object::{CollisionObject, CollisionObjectDesc, Rid};
use std::collections::BTreeMap;

/// Collision objects keyed by RID; iteration is always in RID order
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: BTreeMap<Rid, CollisionObject>,
    next_id: u64,
}

impl ObjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build shapes from `desc` and register the object
    pub fn insert(&mut self, desc: CollisionObjectDesc) -> Result<Rid> {
        let shapes = desc.build_shapes()?;
        self.next_id += 1;
        let rid = Rid(self.next_id);
        self.objects.insert(rid, CollisionObject::from_desc(rid, desc, shapes));
        Ok(rid)
    }

    /// Remove an object
    pub fn remove(&mut self, rid: Rid) -> Result<CollisionObject> {
        self.objects.remove(&rid).ok_or(SpaceError::ObjectNotFound(rid))
    }

    /// Look up an object
    pub fn get(&self, rid: Rid) -> Option<&CollisionObject> {
        self.objects.get(&rid)
    }

    /// Look up an object, failing with `ObjectNotFound`
    pub fn try_get(&self, rid: Rid) -> Result<&CollisionObject> {
        self.objects.get(&rid).ok_or(SpaceError::ObjectNotFound(rid))
    }

    pub(crate) fn try_get_mut(&mut self, rid: Rid) -> Result<&mut CollisionObject> {
        self.objects.get_mut(&rid).ok_or(SpaceError::ObjectNotFound(rid))
    }

    /// Whether `rid` is registered
    pub fn contains(&self, rid: Rid) -> bool {
        self.objects.contains_key(&rid)
    }

    /// All objects in RID order
    pub fn iter(&self) -> impl Iterator<Item = &CollisionObject> {
        self.objects.values()
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ColliderShape;

    #[test]
    fn test_insert_and_remove() {
        let mut registry = ObjectRegistry::new();
        let a = registry
            .insert(CollisionObjectDesc::body().with_shape(ColliderShape::sphere(0.5)))
            .unwrap();
        let b = registry.insert(CollisionObjectDesc::area()).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().shape_count(), 1);

        registry.remove(a).unwrap();
        assert!(!registry.contains(a));
        assert_eq!(registry.remove(a).unwrap_err(), SpaceError::ObjectNotFound(a));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = ObjectRegistry::new();
        let a = registry.insert(CollisionObjectDesc::body()).unwrap();
        registry.remove(a).unwrap();
        let b = registry.insert(CollisionObjectDesc::body()).unwrap();
        assert!(b > a);
    }
}
