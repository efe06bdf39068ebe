use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an entity in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a world (dimension) hosted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub u32);

impl WorldId {
    /// The world every engine starts with.
    pub const PRIMARY: WorldId = WorldId(0);
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// A coordinate in a specific world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldId,
    pub position: Vec3,
}

impl Location {
    pub fn new(world: WorldId, position: Vec3) -> Self {
        Self { world, position }
    }

    /// Location in the primary world.
    pub fn primary(x: f32, y: f32, z: f32) -> Self {
        Self::new(WorldId::PRIMARY, Vec3::new(x, y, z))
    }
}

/// The region a location falls in. Regions are square columns on the XZ plane;
/// the Y axis does not take part in addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionCoord {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

impl RegionCoord {
    pub fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// Region containing `location` for regions `region_size` units wide.
    pub fn containing(location: &Location, region_size: f32) -> Self {
        Self {
            world: location.world,
            x: (location.position.x / region_size).floor() as i32,
            z: (location.position.z / region_size).floor() as i32,
        }
    }
}
