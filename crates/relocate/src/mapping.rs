use serde::{Deserialize, Serialize};
use worldspace_common::Location;

use crate::error::RelocateError;

/// How a destination list is matched against the entity list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingPolicy {
    /// Entity `i` goes to `locations[i % locations.len()]`. Fewer destinations
    /// than entities means several entities share each destination.
    #[default]
    Wrap,
    /// Exactly one destination per entity; any length mismatch is an error.
    Strict,
}

/// Resolved destinations for one relocation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Destinations {
    locations: Vec<Location>,
    shared: bool,
}

impl Destinations {
    /// Every entity goes to `location`.
    pub fn shared(location: Location) -> Self {
        Self {
            locations: vec![location],
            shared: true,
        }
    }

    /// One destination per position, matched according to `policy`.
    pub fn list(
        locations: Vec<Location>,
        entity_count: usize,
        policy: MappingPolicy,
    ) -> Result<Self, RelocateError> {
        if locations.is_empty() {
            return Err(RelocateError::EmptyDestinations);
        }
        if policy == MappingPolicy::Strict && locations.len() != entity_count {
            return Err(RelocateError::DestinationCountMismatch {
                entities: entity_count,
                locations: locations.len(),
            });
        }
        Ok(Self {
            locations,
            shared: false,
        })
    }

    /// Destination for the entity at original position `index`.
    pub fn resolve(&self, index: usize) -> &Location {
        &self.locations[index % self.locations.len()]
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Number of destinations supplied.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
