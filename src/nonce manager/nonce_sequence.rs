//! Local sequence counter of a single sender.
//!
//! The network's replay protection requires every access-key nonce to be
//! strictly greater than the last one it executed. The dispatcher fetches the
//! starting nonce once and then hands out `start + offset` for offsets
//! `1, 2, 3, ...` with no gaps and no repeats.

/// One issued position in a sender's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSlot {
    /// 1-based position among this sender's transactions (ledger key)
    pub offset: u64,
    /// Network-level nonce carried by the transaction
    pub nonce: u64,
}

/// Pre-incrementing counter owned by exactly one dispatcher.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    start: u64,
    issued: u64,
}

impl SequenceCounter {
    /// Create a counter from the last nonce the network has recorded.
    pub fn new(start: u64) -> Self {
        Self { start, issued: 0 }
    }

    /// Starting nonce fetched from the network.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// How many slots have been issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Issue the next slot.
    pub fn next_slot(&mut self) -> SequenceSlot {
        self.issued += 1;
        SequenceSlot {
            offset: self.issued,
            nonce: self.start + self.issued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_one_based_without_gaps() {
        let mut counter = SequenceCounter::new(41);
        let slots: Vec<_> = (0..5).map(|_| counter.next_slot()).collect();

        let offsets: Vec<u64> = slots.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![1, 2, 3, 4, 5]);

        let nonces: Vec<u64> = slots.iter().map(|s| s.nonce).collect();
        assert_eq!(nonces, vec![42, 43, 44, 45, 46]);
        assert_eq!(counter.issued(), 5);
        assert_eq!(counter.start(), 41);
    }
}
