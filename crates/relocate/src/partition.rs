use std::num::NonZeroUsize;
use worldspace_common::EntityId;

/// A contiguous slice of a relocation request.
///
/// `offset` is the position of the first entity in the original sequence, so
/// every entity keeps its original index for destination lookup and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    offset: usize,
    entities: Vec<EntityId>,
}

impl Batch {
    pub fn new(offset: usize, entities: Vec<EntityId>) -> Self {
        Self { offset, entities }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities paired with their position in the original sequence.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, EntityId)> + '_ {
        self.entities
            .iter()
            .enumerate()
            .map(move |(i, id)| (self.offset + i, *id))
    }
}

/// Number of batches `len` entities split into.
pub fn batch_count(len: usize, size: NonZeroUsize) -> usize {
    len.div_ceil(size.get())
}

/// Split `entities` into batches of `size`, in order. The last batch may be
/// shorter. Slicing is by position, so repeated handles are kept as-is.
pub fn partition(entities: &[EntityId], size: NonZeroUsize) -> Vec<Batch> {
    entities
        .chunks(size.get())
        .enumerate()
        .map(|(n, chunk)| Batch::new(n * size.get(), chunk.to_vec()))
        .collect()
}
