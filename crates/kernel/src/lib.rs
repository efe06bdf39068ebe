//! World Kernel: authoritative world state and the queue that feeds its thread.
//!
//! # Invariants
//! - All state mutations flow through explicit operations.
//! - Mutation happens only on the thread that owns the world; other threads
//!   reach it by sending tasks through an [`AuthorityHandle`].

pub mod authority;
pub mod engine;
pub mod world;

pub use authority::{AuthorityHandle, AuthorityQueue, AuthorityStats, QueueClosed, TaskKind};
pub use engine::{WorldEngine, WorldError};
pub use world::{EntityData, World, WorldEvent};
