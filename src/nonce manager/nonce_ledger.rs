//! Shared Nonce Ledger
//!
//! One monotonic watermark per sender: the highest transaction offset that
//! the network has been observed to execute. Every confirmation task of every
//! sender shares the same ledger, so all writes go through a lock-free
//! compare-and-swap "raise" that can only move a slot upwards.

use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-size array of per-sender confirmed-offset watermarks.
#[derive(Debug)]
pub struct NonceLedger {
    slots: Box<[AtomicU64]>,
}

impl NonceLedger {
    /// Create a ledger with `senders` slots, all starting at 0.
    pub fn new(senders: usize) -> Self {
        let slots = (0..senders).map(|_| AtomicU64::new(0)).collect();
        Self { slots }
    }

    /// Number of sender slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Latest confirmed offset for `sender_index`.
    ///
    /// # Panics
    ///
    /// Panics if `sender_index` is out of range.
    pub fn read(&self, sender_index: usize) -> u64 {
        self.slots[sender_index].load(Ordering::Acquire)
    }

    /// Raise the slot to `candidate` if it is strictly greater than the
    /// current value. Returns `true` when this call advanced the slot.
    ///
    /// A lost race re-reads the slot and tries again until either the write
    /// lands or another writer has already put an equal or higher value.
    ///
    /// # Panics
    ///
    /// Panics if `sender_index` is out of range.
    pub fn raise(&self, sender_index: usize, candidate: u64) -> bool {
        let slot = &self.slots[sender_index];
        let mut current = slot.load(Ordering::Acquire);
        while current < candidate {
            match slot.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    /// Copy of every slot, in sender order.
    pub fn snapshot(&self) -> Vec<u64> {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_slots_start_at_zero() {
        let ledger = NonceLedger::new(3);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.snapshot(), vec![0, 0, 0]);
    }

    #[test]
    fn test_raise_only_moves_up() {
        let ledger = NonceLedger::new(1);
        assert!(ledger.raise(0, 5));
        assert!(!ledger.raise(0, 3));
        assert_eq!(ledger.read(0), 5);
        assert!(ledger.raise(0, 6));
        assert_eq!(ledger.read(0), 6);
    }

    #[test]
    fn test_raise_is_idempotent() {
        let once = NonceLedger::new(1);
        once.raise(0, 4);

        let twice = NonceLedger::new(1);
        twice.raise(0, 4);
        assert!(!twice.raise(0, 4));

        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn test_slots_are_independent() {
        let ledger = NonceLedger::new(2);
        ledger.raise(1, 9);
        assert_eq!(ledger.read(0), 0);
        assert_eq!(ledger.read(1), 9);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_index_panics() {
        let ledger = NonceLedger::new(1);
        ledger.read(1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_concurrent_raise_ends_at_max(values in proptest::collection::vec(0u64..10_000, 1..64)) {
            let ledger = Arc::new(NonceLedger::new(1));
            let handles: Vec<_> = values
                .chunks(4)
                .map(|chunk| {
                    let ledger = ledger.clone();
                    let chunk = chunk.to_vec();
                    std::thread::spawn(move || {
                        let mut last_seen = 0;
                        for v in chunk {
                            ledger.raise(0, v);
                            let now = ledger.read(0);
                            // never observed going backwards from this thread
                            assert!(now >= last_seen);
                            last_seen = now;
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            let max = values.iter().copied().max().unwrap_or(0);
            prop_assert_eq!(ledger.read(0), max);
        }
    }
}
