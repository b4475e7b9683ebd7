//! Per-action polling cadence and deadlines.
//!
//! Creation can take anywhere from twenty minutes to over an hour depending
//! on how the tenant's pools are configured, so it polls on a slow cadence
//! with a long deadline. Power actions settle within minutes and poll
//! faster. The table is plain configuration so tests can run the watcher
//! with millisecond timings.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ws_core::WorkstationAction;

/// Poll interval and deadline for one action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTiming {
    /// Time between consecutive status checks. The first check happens one
    /// interval after the watch is registered.
    pub interval: Duration,
    /// Total time allowed before the operation is reported as timed out.
    pub deadline: Duration,
}

/// Lookup table of [`ActionTiming`] per action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTimings {
    pub create: ActionTiming,
    pub start: ActionTiming,
    pub stop: ActionTiming,
    pub restart: ActionTiming,
    pub delete: ActionTiming,
    pub provisioning_watch: ActionTiming,
}

impl ActionTimings {
    pub fn for_action(&self, action: WorkstationAction) -> ActionTiming {
        match action {
            WorkstationAction::Create => self.create,
            WorkstationAction::Start => self.start,
            WorkstationAction::Stop => self.stop,
            WorkstationAction::Restart => self.restart,
            WorkstationAction::Delete => self.delete,
            WorkstationAction::ProvisioningWatch => self.provisioning_watch,
        }
    }

    /// Identical timing for every action. Intended for tests.
    pub fn uniform(interval: Duration, deadline: Duration) -> Self {
        let timing = ActionTiming { interval, deadline };
        Self {
            create: timing,
            start: timing,
            stop: timing,
            restart: timing,
            delete: timing,
            provisioning_watch: timing,
        }
    }
}

impl Default for ActionTimings {
    fn default() -> Self {
        let slow = ActionTiming {
            interval: Duration::from_secs(180),
            deadline: Duration::from_secs(2 * 60 * 60),
        };
        let fast = ActionTiming {
            interval: Duration::from_secs(30),
            deadline: Duration::from_secs(10 * 60),
        };
        Self {
            create: slow,
            provisioning_watch: slow,
            start: fast,
            stop: fast,
            restart: fast,
            delete: ActionTiming {
                interval: Duration::from_secs(30),
                deadline: Duration::from_secs(20 * 60),
            },
        }
    }
}
