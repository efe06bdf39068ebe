//! Shared types used across the worldspace crates.

mod types;

pub use types::{EntityId, Location, RegionCoord, WorldId};
