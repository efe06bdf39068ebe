use crate::config::ConfigError;

/// Errors a relocation call reports synchronously.
///
/// Problems with individual entities are never errors; they show up as
/// [`crate::SkipReason`]s in the call's report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelocateError {
    #[error("destination list is empty")]
    EmptyDestinations,
    #[error(
        "strict mapping needs one destination per entity: {entities} entities, {locations} locations"
    )]
    DestinationCountMismatch { entities: usize, locations: usize },
    #[error("relocation service is shut down")]
    Rejected,
}

/// Errors from starting a [`crate::RelocationService`].
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
