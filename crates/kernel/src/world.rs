use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use worldspace_common::{EntityId, Location, RegionCoord, WorldId};

use crate::engine::{WorldEngine, WorldError};

/// Default edge length of a region, in world units.
pub const DEFAULT_REGION_SIZE: f32 = 16.0;

/// An event record produced by every mutation to the world.
///
/// The log lets hosts and tests observe exactly which mutations happened and
/// in what order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// Entity was spawned at the given location.
    Spawned { id: EntityId, location: Location },
    /// Entity was despawned. Carries its last location.
    Despawned { id: EntityId, location: Location },
    /// Entity went online or offline.
    ActiveChanged { id: EntityId, active: bool },
    /// Entity was moved.
    Relocated {
        id: EntityId,
        from: Location,
        to: Location,
    },
    /// A region was loaded.
    RegionLoaded { region: RegionCoord },
    /// A region was unloaded.
    RegionUnloaded { region: RegionCoord },
}

/// The authoritative world state.
///
/// All mutations go through explicit operations. The kernel owns the truth;
/// schedulers and tools derive from it.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order across all platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    entities: BTreeMap<EntityId, EntityData>,
    worlds: BTreeSet<WorldId>,
    loaded_regions: BTreeSet<RegionCoord>,
    region_size: f32,
    /// Append-only event log of all mutations.
    #[serde(skip)]
    event_log: Vec<WorldEvent>,
}

/// Per-entity data stored in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityData {
    pub location: Location,
    pub active: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::with_region_size(DEFAULT_REGION_SIZE)
    }
}

impl World {
    /// Create an empty world engine hosting only [`WorldId::PRIMARY`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty world engine with a custom region edge length.
    pub fn with_region_size(region_size: f32) -> Self {
        assert!(region_size > 0.0, "region_size must be positive");
        Self {
            entities: BTreeMap::new(),
            worlds: BTreeSet::from([WorldId::PRIMARY]),
            loaded_regions: BTreeSet::new(),
            region_size,
            event_log: Vec::new(),
        }
    }

    pub fn region_size(&self) -> f32 {
        self.region_size
    }

    /// Register an additional world. Returns false if it already existed.
    pub fn add_world(&mut self, world: WorldId) -> bool {
        self.worlds.insert(world)
    }

    /// Number of entities in the world.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Read-only access to all entities (BTreeMap for deterministic iteration).
    pub fn entities(&self) -> &BTreeMap<EntityId, EntityData> {
        &self.entities
    }

    /// Spawn a new, active entity at `location`. Returns its id.
    pub fn spawn(&mut self, location: Location) -> EntityId {
        let id = EntityId::new();
        self.spawn_with_id(id, location);
        id
    }

    /// Spawn an entity with a specific id.
    pub fn spawn_with_id(&mut self, id: EntityId, location: Location) {
        self.entities.insert(
            id,
            EntityData {
                location,
                active: true,
            },
        );
        self.event_log.push(WorldEvent::Spawned { id, location });
    }

    /// Remove an entity. Returns the data if it existed.
    pub fn despawn(&mut self, id: EntityId) -> Option<EntityData> {
        let data = self.entities.remove(&id);
        if let Some(ref d) = data {
            self.event_log.push(WorldEvent::Despawned {
                id,
                location: d.location,
            });
        }
        data
    }

    /// Mark an entity online or offline. Returns false for unknown entities.
    pub fn set_active(&mut self, id: EntityId, active: bool) -> bool {
        match self.entities.get_mut(&id) {
            Some(data) => {
                if data.active != active {
                    data.active = active;
                    self.event_log.push(WorldEvent::ActiveChanged { id, active });
                }
                true
            }
            None => false,
        }
    }

    /// Get a reference to entity data.
    pub fn get(&self, id: EntityId) -> Option<&EntityData> {
        self.entities.get(&id)
    }

    /// Current location of an entity.
    pub fn location_of(&self, id: EntityId) -> Option<Location> {
        self.entities.get(&id).map(|d| d.location)
    }

    /// Move an entity and log the change.
    ///
    /// The destination world must exist and the destination region must be
    /// loaded; entities never land in unloaded regions.
    pub fn relocate(&mut self, id: EntityId, to: Location) -> Result<Location, WorldError> {
        if !self.worlds.contains(&to.world) {
            return Err(WorldError::UnknownWorld(to.world));
        }
        let region = RegionCoord::containing(&to, self.region_size);
        if !self.loaded_regions.contains(&region) {
            return Err(WorldError::RegionNotLoaded(region));
        }
        let data = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownEntity(id))?;
        if !data.active {
            return Err(WorldError::Inactive(id));
        }
        let from = data.location;
        data.location = to;
        self.event_log.push(WorldEvent::Relocated { id, from, to });
        Ok(from)
    }

    /// Load a region. Returns false if it was already loaded.
    pub fn load(&mut self, region: RegionCoord) -> bool {
        let inserted = self.loaded_regions.insert(region);
        if inserted {
            tracing::debug!(?region, "region loaded");
            self.event_log.push(WorldEvent::RegionLoaded { region });
        }
        inserted
    }

    /// Unload a region. Entities inside keep their positions.
    pub fn unload(&mut self, region: RegionCoord) -> bool {
        let removed = self.loaded_regions.remove(&region);
        if removed {
            tracing::debug!(?region, "region unloaded");
            self.event_log.push(WorldEvent::RegionUnloaded { region });
        }
        removed
    }

    /// All loaded regions.
    pub fn loaded_regions(&self) -> &BTreeSet<RegionCoord> {
        &self.loaded_regions
    }

    /// Number of `RegionLoaded` events in the current log.
    pub fn region_load_count(&self) -> usize {
        self.event_log
            .iter()
            .filter(|e| matches!(e, WorldEvent::RegionLoaded { .. }))
            .count()
    }
}

impl WorldEngine for World {
    fn has_world(&self, world: WorldId) -> bool {
        self.worlds.contains(&world)
    }

    fn is_entity_active(&self, id: EntityId) -> Option<bool> {
        self.entities.get(&id).map(|d| d.active)
    }

    fn set_entity_location(&mut self, id: EntityId, location: Location) -> Result<(), WorldError> {
        self.relocate(id, location).map(|_| ())
    }

    fn region_of(&self, location: &Location) -> RegionCoord {
        RegionCoord::containing(location, self.region_size)
    }

    fn is_region_loaded(&self, region: RegionCoord) -> bool {
        self.loaded_regions.contains(&region)
    }

    fn load_region(&mut self, region: RegionCoord) {
        self.load(region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Location {
        Location::primary(0.0, 0.0, 0.0)
    }

    #[test]
    fn world_starts_empty() {
        let w = World::new();
        assert_eq!(w.entity_count(), 0);
        assert!(w.loaded_regions().is_empty());
        assert!(w.has_world(WorldId::PRIMARY));
    }

    #[test]
    fn spawn_and_despawn() {
        let mut w = World::new();
        let id = w.spawn(origin());
        assert_eq!(w.entity_count(), 1);
        assert_eq!(w.is_entity_active(id), Some(true));

        let data = w.despawn(id);
        assert!(data.is_some());
        assert_eq!(w.entity_count(), 0);
        assert_eq!(w.is_entity_active(id), None);
    }

    #[test]
    fn relocate_requires_loaded_region() {
        let mut w = World::new();
        let id = w.spawn(origin());
        let dest = Location::primary(40.0, 64.0, 40.0);

        let err = w.relocate(id, dest).unwrap_err();
        assert_eq!(err, WorldError::RegionNotLoaded(w.region_of(&dest)));

        w.load(w.region_of(&dest));
        assert_eq!(w.relocate(id, dest).unwrap(), origin());
        assert_eq!(w.location_of(id), Some(dest));
    }

    #[test]
    fn relocate_rejects_inactive_and_unknown() {
        let mut w = World::new();
        w.load(w.region_of(&origin()));
        let id = w.spawn(origin());
        w.set_active(id, false);

        assert_eq!(w.relocate(id, origin()), Err(WorldError::Inactive(id)));

        let ghost = EntityId::new();
        assert_eq!(w.relocate(ghost, origin()), Err(WorldError::UnknownEntity(ghost)));

        let nether = Location::new(WorldId(9), glam::Vec3::ZERO);
        assert_eq!(w.relocate(id, nether), Err(WorldError::UnknownWorld(WorldId(9))));
    }

    #[test]
    fn load_is_idempotent() {
        let mut w = World::new();
        let region = w.region_of(&origin());
        assert!(w.load(region));
        assert!(!w.load(region));
        assert_eq!(w.region_load_count(), 1);
    }

    #[test]
    fn events_are_recorded_in_order() {
        let mut w = World::new();
        let id = w.spawn(origin());
        w.load(w.region_of(&origin()));
        w.relocate(id, Location::primary(1.0, 0.0, 1.0)).unwrap();
        w.set_active(id, false);
        w.despawn(id);

        let events = w.drain_events();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], WorldEvent::Spawned { .. }));
        assert!(matches!(events[1], WorldEvent::RegionLoaded { .. }));
        assert!(matches!(events[2], WorldEvent::Relocated { .. }));
        assert!(matches!(events[3], WorldEvent::ActiveChanged { active: false, .. }));
        assert!(matches!(events[4], WorldEvent::Despawned { .. }));
        assert!(w.events().is_empty());
    }

    #[test]
    fn set_active_is_quiet_when_unchanged() {
        let mut w = World::new();
        let id = w.spawn(origin());
        assert!(w.set_active(id, true));
        assert_eq!(w.events().len(), 1);
        assert!(!w.set_active(EntityId::new(), false));
    }

    #[test]
    fn unload_keeps_entities() {
        let mut w = World::new();
        let region = w.region_of(&origin());
        w.load(region);
        let id = w.spawn(origin());
        assert!(w.unload(region));
        assert!(!w.is_region_loaded(region));
        assert_eq!(w.location_of(id), Some(origin()));
    }
}
