use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use worldspace_common::{EntityId, Location};
use worldspace_kernel::WorldEngine;
use worldspace_stream::RegionPrefetcher;

use crate::report::{BatchOutcome, SkipReason, SkippedEntity};

/// One pending move, carried from a worker to the authoritative thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelocationTask {
    /// Position in the call's entity sequence.
    pub index: usize,
    pub entity: EntityId,
    pub location: Location,
}

/// Applies moves on the authoritative thread.
#[derive(Debug, Clone, Default)]
pub struct RelocationExecutor {
    prefetcher: RegionPrefetcher,
    late_loads: Arc<AtomicUsize>,
}

impl RelocationExecutor {
    pub fn new(prefetcher: RegionPrefetcher) -> Self {
        Self {
            prefetcher,
            late_loads: Arc::default(),
        }
    }

    pub fn prefetcher(&self) -> &RegionPrefetcher {
        &self.prefetcher
    }

    /// Regions the relocation step had to load itself because no prefetch
    /// had reached them yet.
    pub fn late_loads(&self) -> usize {
        self.late_loads.load(Ordering::Relaxed)
    }

    /// Move one entity, or say why not.
    pub fn relocate<W: WorldEngine>(
        &self,
        world: &mut W,
        entity: EntityId,
        location: &Location,
    ) -> Result<(), SkipReason> {
        if !world.has_world(location.world) {
            return Err(SkipReason::MissingLocation);
        }
        match world.is_entity_active(entity) {
            None => return Err(SkipReason::MissingEntity),
            Some(false) => return Err(SkipReason::Inactive),
            Some(true) => {}
        }
        // prefetch counters count prefetch tasks only
        let region = world.region_of(location);
        if !world.is_region_loaded(region) {
            tracing::debug!(?region, "region loaded at relocation time");
            world.load_region(region);
            self.late_loads.fetch_add(1, Ordering::Relaxed);
        }
        world
            .set_entity_location(entity, *location)
            .map_err(|e| SkipReason::Failed(e.to_string()))
    }

    /// Run a batch in order. A skipped entity does not stop the rest.
    pub fn run_batch<W: WorldEngine>(
        &self,
        world: &mut W,
        tasks: &[RelocationTask],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for task in tasks {
            match self.relocate(world, task.entity, &task.location) {
                Ok(()) => outcome.relocated += 1,
                Err(reason) => {
                    tracing::trace!(
                        index = task.index,
                        entity = ?task.entity,
                        %reason,
                        "relocation skipped"
                    );
                    outcome.skipped.push(SkippedEntity {
                        index: task.index,
                        entity: task.entity,
                        reason,
                    });
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldspace_common::{RegionCoord, WorldId};
    use worldspace_kernel::{World, WorldError, WorldEvent};

    /// A world that refuses to move one particular entity.
    struct Stubborn {
        inner: World,
        refuse: EntityId,
    }

    impl WorldEngine for Stubborn {
        fn has_world(&self, world: WorldId) -> bool {
            self.inner.has_world(world)
        }
        fn is_entity_active(&self, id: EntityId) -> Option<bool> {
            self.inner.is_entity_active(id)
        }
        fn set_entity_location(
            &mut self,
            id: EntityId,
            location: Location,
        ) -> Result<(), WorldError> {
            if id == self.refuse {
                return Err(WorldError::Refused("pinned".into()));
            }
            self.inner.set_entity_location(id, location)
        }
        fn region_of(&self, location: &Location) -> RegionCoord {
            self.inner.region_of(location)
        }
        fn is_region_loaded(&self, region: RegionCoord) -> bool {
            self.inner.is_region_loaded(region)
        }
        fn load_region(&mut self, region: RegionCoord) {
            self.inner.load_region(region)
        }
    }

    fn dest() -> Location {
        Location::primary(100.0, 64.0, 100.0)
    }

    #[test]
    fn moves_active_entity() {
        let mut world = World::new();
        let id = world.spawn(Location::primary(0.0, 0.0, 0.0));
        let exec = RelocationExecutor::default();

        assert_eq!(exec.relocate(&mut world, id, &dest()), Ok(()));
        assert_eq!(world.location_of(id), Some(dest()));
    }

    #[test]
    fn inactive_and_missing_are_skipped() {
        let mut world = World::new();
        let offline = world.spawn(Location::primary(0.0, 0.0, 0.0));
        world.set_active(offline, false);
        let exec = RelocationExecutor::default();

        assert_eq!(exec.relocate(&mut world, offline, &dest()), Err(SkipReason::Inactive));
        assert_eq!(
            exec.relocate(&mut world, EntityId::new(), &dest()),
            Err(SkipReason::MissingEntity)
        );
        let nowhere = Location::new(WorldId(42), glam::Vec3::ZERO);
        assert_eq!(exec.relocate(&mut world, offline, &nowhere), Err(SkipReason::MissingLocation));
        assert_eq!(world.location_of(offline), Some(Location::primary(0.0, 0.0, 0.0)));
    }

    #[test]
    fn unprefetched_region_is_loaded_before_the_move() {
        let mut world = World::new();
        let id = world.spawn(Location::primary(0.0, 0.0, 0.0));
        world.drain_events();
        let exec = RelocationExecutor::default();

        exec.relocate(&mut world, id, &dest()).unwrap();
        assert_eq!(exec.late_loads(), 1);
        let events = world.events();
        assert!(matches!(events[0], WorldEvent::RegionLoaded { .. }));
        assert!(matches!(events[1], WorldEvent::Relocated { .. }));
    }

    #[test]
    fn prefetched_region_is_not_a_late_load() {
        let mut world = World::new();
        let id = world.spawn(Location::primary(0.0, 0.0, 0.0));
        let exec = RelocationExecutor::default();
        exec.prefetcher().ensure_loaded(&mut world, &dest());

        exec.relocate(&mut world, id, &dest()).unwrap();
        assert_eq!(exec.late_loads(), 0);
        assert_eq!(world.region_load_count(), 1);
        // the relocation's own region check is not a prefetch request
        assert_eq!(exec.prefetcher().stats().requested, 1);
    }

    #[test]
    fn failure_does_not_abort_the_batch() {
        let mut inner = World::new();
        let ids: Vec<EntityId> = (0..4)
            .map(|_| inner.spawn(Location::primary(0.0, 0.0, 0.0)))
            .collect();
        let mut world = Stubborn {
            inner,
            refuse: ids[1],
        };
        let tasks: Vec<RelocationTask> = ids
            .iter()
            .enumerate()
            .map(|(index, &entity)| RelocationTask {
                index,
                entity,
                location: dest(),
            })
            .collect();

        let outcome = RelocationExecutor::default().run_batch(&mut world, &tasks);
        assert_eq!(outcome.relocated, 3);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 1);
        assert!(matches!(outcome.skipped[0].reason, SkipReason::Failed(_)));
        assert_eq!(world.inner.location_of(ids[3]), Some(dest()));
    }

    #[test]
    fn batch_runs_in_order() {
        let mut world = World::new();
        let id = world.spawn(Location::primary(0.0, 0.0, 0.0));
        let first = Location::primary(1.0, 0.0, 1.0);
        let second = Location::primary(2.0, 0.0, 2.0);
        let tasks = [
            RelocationTask {
                index: 0,
                entity: id,
                location: first,
            },
            RelocationTask {
                index: 1,
                entity: id,
                location: second,
            },
        ];

        let outcome = RelocationExecutor::default().run_batch(&mut world, &tasks);
        assert_eq!(outcome.relocated, 2);
        assert_eq!(world.location_of(id), Some(second));
    }
}
