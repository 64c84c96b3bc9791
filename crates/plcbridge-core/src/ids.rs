//! Order, node and action identifiers.
//!
//! Ids are 16 lowercase hex digits, the shape the robot already accepts.
//! Values come from a hybrid clock: each draw is the current Unix time in
//! nanoseconds, or one more than the previous draw when the clock has not
//! advanced. Draws are therefore strictly increasing inside the process,
//! whatever the clock resolution or the number of concurrent callers, and
//! still follow wall time across restarts.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Identifiers of one freshly built order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIds {
    pub order_id: String,
    pub node_id: String,
    pub action_id: String,
}

/// Lock-free, strictly monotonic id source.
#[derive(Debug)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// A generator whose first draw is greater than `floor`.
    pub fn starting_after(floor: u64) -> Self {
        Self {
            last: AtomicU64::new(floor),
        }
    }

    /// Draw the next raw value.
    pub fn next_raw(&self) -> u64 {
        let now = now_nanos();
        let advance = |last: u64| now.max(last.saturating_add(1));
        match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(advance(last)))
        {
            Ok(previous) | Err(previous) => advance(previous),
        }
    }

    pub fn next_id(&self) -> String {
        format!("{:016x}", self.next_raw())
    }

    /// Three consecutive draws for an order, its node and its action.
    pub fn next_order_ids(&self) -> OrderIds {
        OrderIds {
            order_id: self.next_id(),
            node_id: self.next_id(),
            action_id: self.next_id(),
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn now_nanos() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ids_are_sixteen_hex_digits() {
        let id = IdGenerator::new().next_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn draws_strictly_increase() {
        let ids = IdGenerator::new();
        let mut previous = ids.next_raw();
        for _ in 0..10_000 {
            let next = ids.next_raw();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn floor_ahead_of_clock_still_increases() {
        let floor = u64::MAX / 2;
        let ids = IdGenerator::starting_after(floor);
        assert_eq!(ids.next_raw(), floor + 1);
        assert_eq!(ids.next_raw(), floor + 2);
    }

    #[test]
    fn order_ids_are_distinct() {
        let ids = IdGenerator::new().next_order_ids();
        assert_ne!(ids.order_id, ids.node_id);
        assert_ne!(ids.node_id, ids.action_id);
        assert_ne!(ids.order_id, ids.action_id);
    }

    #[test]
    fn concurrent_draws_never_collide() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..2_000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 16_000);
    }
}
