use crate::retrieval::CacheError;

/// Positional store of ranked-neighbor lists, one per query index.
///
/// Lists are append-only: once written at a position they are never
/// replaced.
pub trait NeighborStore {
    fn get(&self, position: usize) -> Option<&[usize]>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&mut self, neighbors: Vec<usize>) -> Result<(), CacheError>;

    /// Persist everything appended so far. No-op for volatile stores.
    fn flush(&mut self) -> Result<(), CacheError>;
}

impl<S: NeighborStore + ?Sized> NeighborStore for &mut S {
    fn get(&self, position: usize) -> Option<&[usize]> {
        (**self).get(position)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn append(&mut self, neighbors: Vec<usize>) -> Result<(), CacheError> {
        (**self).append(neighbors)
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        (**self).flush()
    }
}

/// Process-local store; nothing survives the run.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Vec<Vec<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Vec<usize>] {
        &self.entries
    }
}

impl NeighborStore for InMemoryStore {
    fn get(&self, position: usize) -> Option<&[usize]> {
        self.entries.get(position).map(Vec::as_slice)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn append(&mut self, neighbors: Vec<usize>) -> Result<(), CacheError> {
        self.entries.push(neighbors);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        Ok(())
    }
}
