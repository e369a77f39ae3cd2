//! Session-scoped identifier generation.
//!
//! Every identifier is a 128-bit [`Uuid`] whose high 64 bits are the owning
//! session id and whose low 64 bits come from one of `N` striped counters.
//! Counter `i` yields `i + 1, i + 1 + N, i + 1 + 2N, ...`, so the counters
//! never overlap and callers only ever touch atomics.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::error::IdGeneratorError;

/// Lock-free generator of session-prefixed identifiers.
#[derive(Debug)]
pub struct IdGenerator {
    session_id: u64,
    /// Number of values already drawn from each counter.
    counters: Box<[AtomicU64]>,
    next_counter: AtomicU64,
}

impl IdGenerator {
    /// Create a generator with `concurrency_level` independent counters.
    pub fn new(session_id: u64, concurrency_level: u32) -> Result<Self, IdGeneratorError> {
        if concurrency_level < 1 {
            return Err(IdGeneratorError::InvalidConcurrencyLevel(concurrency_level));
        }

        let counters = (0..concurrency_level).map(|_| AtomicU64::new(0)).collect();
        Ok(Self {
            session_id,
            counters,
            next_counter: AtomicU64::new(0),
        })
    }

    /// Create a generator sized to twice the available parallelism.
    pub fn with_default_concurrency(session_id: u64) -> Result<Self, IdGeneratorError> {
        Self::new(session_id, default_concurrency_level())
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn concurrency_level(&self) -> u32 {
        self.counters.len() as u32
    }

    /// Draw the next identifier.
    pub fn next_id(&self) -> Result<Uuid, IdGeneratorError> {
        let seq = self.next_sequence()?;
        Ok(Uuid::from_u64_pair(self.session_id, seq))
    }

    /// Draw the next low-half value without wrapping it in a [`Uuid`].
    pub fn next_sequence(&self) -> Result<u64, IdGeneratorError> {
        let stride = self.counters.len() as u64;
        let index = self.next_counter.fetch_add(1, Ordering::Relaxed) % stride;
        let value_of = |drawn: u64| {
            drawn
                .checked_mul(stride)
                .and_then(|v| v.checked_add(index + 1))
        };

        // an exhausted counter is left in place so every later draw fails too
        self.counters[index as usize]
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |drawn| {
                value_of(drawn).and(drawn.checked_add(1))
            })
            .ok()
            .and_then(value_of)
            .ok_or(IdGeneratorError::Exhausted {
                sequence: "counter",
                index: index as usize,
            })
    }

    #[cfg(test)]
    pub(crate) fn counters_for_test(&self) -> &[AtomicU64] {
        &self.counters
    }
}

/// Twice the number of available parallel execution units.
pub fn default_concurrency_level() -> u32 {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    u32::try_from(cpus.saturating_mul(2)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = IdGenerator::new(1, 0).unwrap_err();
        assert!(matches!(err, IdGeneratorError::InvalidConcurrencyLevel(0)));
    }

    #[test]
    fn test_single_counter_is_sequential() {
        let generator = IdGenerator::new(7, 1).unwrap();
        let seqs: Vec<u64> = (0..4).map(|_| generator.next_sequence().unwrap()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_striped_counters_interleave() {
        let generator = IdGenerator::new(7, 3).unwrap();
        let seqs: Vec<u64> = (0..6).map(|_| generator.next_sequence().unwrap()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_last_value_of_counter_is_issued_once() {
        let generator = IdGenerator::new(7, 1).unwrap();
        generator.counters_for_test()[0].store(u64::MAX - 1, Ordering::Relaxed);

        assert_eq!(generator.next_sequence().unwrap(), u64::MAX);
        assert!(generator.next_sequence().is_err());
        assert!(generator.next_sequence().is_err());
    }

    #[test]
    fn test_high_half_is_session_id() {
        let generator = IdGenerator::new(0xDEAD_BEEF, 4).unwrap();
        for _ in 0..32 {
            let (high, low) = generator.next_id().unwrap().as_u64_pair();
            assert_eq!(high, 0xDEAD_BEEF);
            assert_ne!(low, 0);
        }
    }

    #[test]
    fn test_unique_across_threads() {
        let generator = Arc::new(IdGenerator::new(42, 5).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..2_000)
                        .map(|_| generator.next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 16_000);
    }

    #[test]
    fn test_exhausted_counter() {
        let generator = IdGenerator::new(1, 2).unwrap();
        generator.counters[0].store(u64::MAX / 2 + 1, Ordering::Relaxed);

        let err = generator.next_sequence().unwrap_err();
        assert!(matches!(
            err,
            IdGeneratorError::Exhausted { index: 0, .. }
        ));
        // The other counter is unaffected.
        assert_eq!(generator.next_sequence().unwrap(), 2);

        // Exhaustion sticks instead of wrapping around to reused values.
        for expected in [4, 6] {
            assert!(generator.next_sequence().is_err());
            assert_eq!(generator.next_sequence().unwrap(), expected);
        }
        assert_eq!(generator.counters[0].load(Ordering::Relaxed), u64::MAX / 2 + 1);
    }

    #[test]
    fn test_default_concurrency_is_positive() {
        assert!(default_concurrency_level() >= 2);
    }
}
