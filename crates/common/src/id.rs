//! ID generation utilities.

use std::sync::{Arc, Mutex, PoisonError};

use ulid::{Generator, Ulid};

/// ID generator for entities.
///
/// IDs are lowercase ULIDs drawn from a shared monotonic generator, so IDs
/// handed out by one generator sort in creation order even within the same
/// millisecond. Allocation relies on this to order tasks by age.
#[derive(Clone)]
pub struct IdGenerator {
    inner: Arc<Mutex<Generator>>,
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Generator::new())),
        }
    }

    /// Generate a new ULID-based ID.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut generator = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Overflow of the random component within one millisecond falls back
        // to a fresh (non-monotonic) ULID.
        let ulid = generator.generate().unwrap_or_else(|_| Ulid::new());
        ulid.to_string().to_lowercase()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_ids_sort_in_creation_order() {
        let id_gen = IdGenerator::new();
        let ids: Vec<String> = (0..64).map(|_| id_gen.generate()).collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_clones_share_sequence() {
        let id_gen = IdGenerator::new();
        let other = id_gen.clone();

        let first = id_gen.generate();
        let second = other.generate();
        assert!(first < second);
    }
}
