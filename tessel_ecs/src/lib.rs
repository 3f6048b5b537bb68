use hecs::{Component, DynamicBundle, Query, QueryBorrow, Ref, World as HecsWorld};
use std::{any::TypeId, collections::HashMap};

pub use hecs::{Entity, EntityBuilder};

/// `hecs` world plus at most one "singleton" entity per component type, used
/// for scene-wide resources such as asset stores.
#[derive(Default)]
pub struct World {
    world: HecsWorld,
    singletons: HashMap<TypeId, Entity>,
}

/// Links a child entity to its parent in the scene graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentOf(pub Entity);

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &HecsWorld {
        &self.world
    }

    /// Stores `singleton`, replacing any previous value of the same type.
    pub fn set_singleton<T: Component>(&mut self, singleton: T) {
        if let Some(slot) = self.get_singleton_mut::<T>() {
            *slot = singleton;
            return;
        }
        let entity = self.world.spawn((singleton,));
        self.singletons.insert(TypeId::of::<T>(), entity);
    }

    pub fn get_singleton<T: Component>(&self) -> Option<Ref<'_, T>> {
        let entity = self.singletons.get(&TypeId::of::<T>())?;
        self.world.get::<&T>(*entity).ok()
    }

    pub fn get_singleton_mut<T: Component>(&mut self) -> Option<&mut T> {
        let entity = self.singletons.get(&TypeId::of::<T>())?;
        self.world.query_one_mut::<&mut T>(*entity).ok()
    }

    pub fn query<Q: Query>(&self) -> QueryBorrow<'_, Q> {
        self.world.query::<Q>()
    }

    pub fn spawn(&mut self, components: impl DynamicBundle) -> Entity {
        self.world.spawn(components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    #[test]
    fn test_singletons() {
        let mut world = World::new();
        assert!(world.get_singleton::<Counter>().is_none());

        world.set_singleton(Counter(1));
        world.get_singleton_mut::<Counter>().unwrap().0 += 1;
        assert_eq!(*world.get_singleton::<Counter>().unwrap(), Counter(2));

        world.set_singleton(Counter(7));
        assert_eq!(*world.get_singleton::<Counter>().unwrap(), Counter(7));
        assert_eq!(world.query::<&Counter>().iter().count(), 1);
    }

    #[test]
    fn test_parent_links() {
        let mut world = World::new();
        let parent = world.spawn(("root",));
        let child = world.spawn(("leaf", ParentOf(parent)));

        let parent_of = *world.get().get::<&ParentOf>(child).unwrap();
        assert_eq!(parent_of, ParentOf(parent));
    }
}
