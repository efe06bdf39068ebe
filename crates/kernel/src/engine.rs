use worldspace_common::{EntityId, Location, RegionCoord, WorldId};

/// Errors a world engine reports when a mutation cannot be applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("unknown world {0}")]
    UnknownWorld(WorldId),
    #[error("entity {0:?} is not active")]
    Inactive(EntityId),
    #[error("region {0:?} is not loaded")]
    RegionNotLoaded(RegionCoord),
    #[error("engine refused mutation: {0}")]
    Refused(String),
}

/// The narrow surface the relocation scheduler needs from a world engine.
///
/// Every method is called on the authoritative thread only.
pub trait WorldEngine: 'static {
    /// Whether `world` exists and can receive entities.
    fn has_world(&self, world: WorldId) -> bool;

    /// `None` if the entity is unknown, otherwise its current active status.
    fn is_entity_active(&self, id: EntityId) -> Option<bool>;

    /// Move an entity. Implementations may refuse.
    fn set_entity_location(&mut self, id: EntityId, location: Location) -> Result<(), WorldError>;

    /// The region `location` falls in.
    fn region_of(&self, location: &Location) -> RegionCoord;

    fn is_region_loaded(&self, region: RegionCoord) -> bool;

    /// Load a region. Returns once the region is loaded.
    fn load_region(&mut self, region: RegionCoord);
}
