//! [`CorrelationTracker`] – single owner of in-flight order state.
//!
//! Holds, behind one mutex:
//!
//! * **active orders** – order id → the PLC command that started it
//! * **canceled orders** – order id → the PLC cancel command that stopped it
//! * the **header id** counter shared by every message sent to the robot
//!
//! An order id lives in at most one of the two maps. Compound steps
//! ([`dispatch_order`], [`dispatch_cancel`], [`settle`], [`evict_stale`])
//! run in a single critical section so that a state report can never observe
//! an order half-way between maps. The transport publish performed inside
//! `dispatch_*` is a non-blocking enqueue, so the lock is held only briefly.
//!
//! [`dispatch_order`]: CorrelationTracker::dispatch_order
//! [`dispatch_cancel`]: CorrelationTracker::dispatch_cancel
//! [`settle`]: CorrelationTracker::settle
//! [`evict_stale`]: CorrelationTracker::evict_stale

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use plcbridge_types::{BridgeError, PlcStatus, StateReport, base_command};

use crate::aggregator::{Lane, verdict};

#[derive(Debug, Clone)]
struct Entry {
    command: String,
    since: Instant,
}

impl Entry {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            since: Instant::now(),
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    active: HashMap<String, Entry>,
    canceled: HashMap<String, Entry>,
    last_header_id: i64,
}

impl TrackerState {
    fn next_header_id(&mut self) -> i64 {
        self.last_header_id += 1;
        self.last_header_id
    }

    fn find_active_by_base(&self, base: &str) -> Option<String> {
        self.active
            .iter()
            .find(|(_, entry)| base_command(&entry.command) == base)
            .map(|(order_id, _)| order_id.clone())
    }
}

/// Outcome of a state report that produced a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub order_id: String,
    /// Originating command (the cancel command for the canceled lane).
    pub command: String,
    pub lane: Lane,
    pub verdict: PlcStatus,
    /// Whether the entry was removed by this report.
    pub removed: bool,
}

/// An entry dropped by the staleness policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub order_id: String,
    pub command: String,
    pub lane: Lane,
    pub age: Duration,
}

/// Point-in-time copy of both maps, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub active: HashMap<String, String>,
    pub canceled: HashMap<String, String>,
    pub last_header_id: i64,
}

#[derive(Debug, Default)]
pub struct CorrelationTracker {
    state: Mutex<TrackerState>,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single insert or remove, so a poisoned lock still
    // guards consistent maps.
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Primitive operations ─────────────────────────────────────────────

    /// Allocate the next header id (first value is 1).
    pub fn next_header_id(&self) -> i64 {
        self.lock().next_header_id()
    }

    pub fn record_active(&self, order_id: &str, command: &str) {
        let mut state = self.lock();
        state.canceled.remove(order_id);
        state.active.insert(order_id.to_string(), Entry::new(command));
    }

    /// Record `order_id` as canceled, taking it out of the active map.
    pub fn record_canceled(&self, order_id: &str, cancel_command: &str) {
        let mut state = self.lock();
        state.active.remove(order_id);
        state
            .canceled
            .insert(order_id.to_string(), Entry::new(cancel_command));
    }

    pub fn lookup_active(&self, order_id: &str) -> Option<String> {
        self.lock().active.get(order_id).map(|e| e.command.clone())
    }

    pub fn lookup_canceled(&self, order_id: &str) -> Option<String> {
        self.lock().canceled.get(order_id).map(|e| e.command.clone())
    }

    /// Find an active order whose command has base `base`.
    ///
    /// When several match, which one is returned is unspecified.
    pub fn resolve_active_by_base_command(&self, base: &str) -> Option<String> {
        self.lock().find_active_by_base(base)
    }

    pub fn remove_active(&self, order_id: &str) -> Option<String> {
        self.lock().active.remove(order_id).map(|e| e.command)
    }

    pub fn remove_canceled(&self, order_id: &str) -> Option<String> {
        self.lock().canceled.remove(order_id).map(|e| e.command)
    }

    pub fn active_len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn canceled_len(&self) -> usize {
        self.lock().canceled.len()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.lock();
        let commands = |map: &HashMap<String, Entry>| -> HashMap<String, String> {
            map.iter()
                .map(|(id, e)| (id.clone(), e.command.clone()))
                .collect()
        };
        TrackerSnapshot {
            active: commands(&state.active),
            canceled: commands(&state.canceled),
            last_header_id: state.last_header_id,
        }
    }

    // ── Compound operations ──────────────────────────────────────────────

    /// Publish a new order and record it as active, atomically.
    ///
    /// `publish` receives the allocated header id and returns the id of the
    /// order it published. Nothing is recorded when it fails.
    pub fn dispatch_order<F>(&self, command: &str, publish: F) -> Result<String, BridgeError>
    where
        F: FnOnce(i64) -> Result<String, BridgeError>,
    {
        let mut state = self.lock();
        let header_id = state.next_header_id();
        let order_id = publish(header_id)?;
        state.canceled.remove(&order_id);
        state.active.insert(order_id.clone(), Entry::new(command));
        Ok(order_id)
    }

    /// Resolve the cancel target for `base`, publish the cancel and move the
    /// target from the active to the canceled map, atomically.
    ///
    /// Returns the canceled order id.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::CancelTargetNotFound`] – no active order has base
    ///   `base`; `publish` is not called.
    /// * whatever `publish` returns; the target then stays active.
    pub fn dispatch_cancel<F>(
        &self,
        base: &str,
        cancel_command: &str,
        publish: F,
    ) -> Result<String, BridgeError>
    where
        F: FnOnce(i64) -> Result<(), BridgeError>,
    {
        let mut state = self.lock();
        let target = state
            .find_active_by_base(base)
            .ok_or_else(|| BridgeError::CancelTargetNotFound(base.to_string()))?;
        let header_id = state.next_header_id();
        publish(header_id)?;
        state.active.remove(&target);
        state
            .canceled
            .insert(target.clone(), Entry::new(cancel_command));
        Ok(target)
    }

    /// Look up the report's order (canceled map first), reduce its action
    /// statuses and drop the entry when the verdict is terminal.
    ///
    /// Returns `None` when the order is unknown or the report yields no
    /// verdict; the maps are then left untouched.
    pub fn settle(&self, report: &StateReport) -> Option<Settlement> {
        let mut state = self.lock();
        let lane = if state.canceled.contains_key(&report.order_id) {
            Lane::Canceled
        } else if state.active.contains_key(&report.order_id) {
            Lane::Active
        } else {
            return None;
        };

        let verdict = verdict(lane, &report.action_states)?;
        let map = match lane {
            Lane::Active => &mut state.active,
            Lane::Canceled => &mut state.canceled,
        };
        let removed = verdict.is_terminal();
        let command = if removed {
            map.remove(&report.order_id)?.command
        } else {
            map.get(&report.order_id)?.command.clone()
        };

        Some(Settlement {
            order_id: report.order_id.clone(),
            command,
            lane,
            verdict,
            removed,
        })
    }

    /// Remove every entry, in either map, older than `ttl`.
    pub fn evict_stale(&self, ttl: Duration) -> Vec<Eviction> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut evicted = Vec::new();
        for (lane, map) in [
            (Lane::Active, &mut state.active),
            (Lane::Canceled, &mut state.canceled),
        ] {
            map.retain(|order_id, entry| {
                let age = entry.since.elapsed();
                if age <= ttl {
                    return true;
                }
                evicted.push(Eviction {
                    order_id: order_id.clone(),
                    command: entry.command.clone(),
                    lane,
                    age,
                });
                false
            });
        }
        evicted
    }
}
