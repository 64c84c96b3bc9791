//! Reduction of per-action robot statuses to one PLC verdict.
//!
//! Two policies exist, one per correlation lane:
//!
//! * **Active** orders are judged on status *counts* only, so the verdict is
//!   independent of the order in which the robot lists its actions. Priority,
//!   highest first: any `FAILED` → Failed; some `FINISHED` with nothing
//!   waiting, initializing or running → Success; any `RUNNING` → Running; any
//!   `INITIALIZING` → Initializing; any `WAITING` → Waiting; otherwise no
//!   verdict.
//! * **Canceled** orders are judged by scanning the report in order: the first
//!   `FAILED` or `FINISHED` action decides, everything else is skipped.
//!
//! `PAUSED` and unrecognised statuses never influence either policy.

use plcbridge_types::{ActionState, ActionStatus, PlcStatus};

/// Which map an order id was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Active,
    Canceled,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub waiting: usize,
    pub initializing: usize,
    pub running: usize,
    pub finished: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn tally(states: &[ActionState]) -> Self {
        let mut counts = Self::default();
        for state in states {
            match state.action_status {
                ActionStatus::Waiting => counts.waiting += 1,
                ActionStatus::Initializing => counts.initializing += 1,
                ActionStatus::Running => counts.running += 1,
                ActionStatus::Finished => counts.finished += 1,
                ActionStatus::Failed => counts.failed += 1,
                ActionStatus::Paused | ActionStatus::Unknown => {}
            }
        }
        counts
    }

    fn in_flight(&self) -> usize {
        self.waiting + self.initializing + self.running
    }
}

pub fn reduce_active(counts: &StatusCounts) -> Option<PlcStatus> {
    if counts.failed > 0 {
        Some(PlcStatus::Failed)
    } else if counts.finished > 0 && counts.in_flight() == 0 {
        Some(PlcStatus::Success)
    } else if counts.running > 0 {
        Some(PlcStatus::Running)
    } else if counts.initializing > 0 {
        Some(PlcStatus::Initializing)
    } else if counts.waiting > 0 {
        Some(PlcStatus::Waiting)
    } else {
        None
    }
}

pub fn reduce_canceled(states: &[ActionState]) -> Option<PlcStatus> {
    states.iter().find_map(|state| match state.action_status {
        ActionStatus::Failed => Some(PlcStatus::Failed),
        ActionStatus::Finished => Some(PlcStatus::Success),
        _ => None,
    })
}

/// Verdict for a report on an order in `lane`.
pub fn verdict(lane: Lane, states: &[ActionState]) -> Option<PlcStatus> {
    match lane {
        Lane::Active => reduce_active(&StatusCounts::tally(states)),
        Lane::Canceled => reduce_canceled(states),
    }
}
