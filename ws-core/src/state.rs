//! Status axes reported by the management plane and the composite lifecycle
//! state the host sees.
//!
//! A workstation snapshot carries three independent axes: how far creation
//! has progressed (`ProvisioningState`), whether the machine is powered
//! (`PowerState`), and what transition is in flight (`ActionState`). The
//! host-visible `CompositeState` is a pure function of the three; it is
//! never inferred from wall-clock time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of workstation creation as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    NotStarted,
    Creating,
    Provisioning,
    Succeeded,
    Failed,
    Canceled,
    Deleting,
    #[serde(other)]
    #[default]
    Unknown,
}

impl ProvisioningState {
    /// True while the server is still bringing the machine up. Machines in
    /// this range show up in listings before their creation operation has
    /// finished.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            ProvisioningState::NotStarted
                | ProvisioningState::Creating
                | ProvisioningState::Provisioning
        )
    }
}

/// Power state of the underlying virtual machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    Running,
    Hibernated,
    Deallocated,
    PoweredOff,
    #[serde(other)]
    #[default]
    Unknown,
}

/// Transition currently in flight on the workstation, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionState {
    Started,
    Starting,
    Stopped,
    Stopping,
    Restarting,
    #[serde(other)]
    #[default]
    Unknown,
}

/// Status of a server-side long-running operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    #[default]
    NotStarted,
    Running,
    Succeeded,
    Canceled,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Canceled | OperationStatus::Failed
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Long-running action the extension can drive against a workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkstationAction {
    Create,
    Start,
    Stop,
    Restart,
    Delete,
    /// Secondary watch on a machine created outside the extension, polling
    /// its provisioning state rather than an operation record.
    ProvisioningWatch,
}

impl fmt::Display for WorkstationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkstationAction::Create => "create",
            WorkstationAction::Start => "start",
            WorkstationAction::Stop => "stop",
            WorkstationAction::Restart => "restart",
            WorkstationAction::Delete => "delete",
            WorkstationAction::ProvisioningWatch => "watch provisioning of",
        };
        f.write_str(name)
    }
}

/// Single host-visible lifecycle state derived from the three status axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositeState {
    Creating,
    Starting,
    Running,
    Stopping,
    Stopped,
    Restarting,
    /// Hibernated with session state saved.
    Saved,
    Deleting,
    Error,
    Unknown,
}

impl CompositeState {
    /// Derive the composite state from a snapshot's three axes.
    ///
    /// Precedence: a failed or canceled provisioning always wins, then
    /// in-progress provisioning, then deletion, then whatever transition the
    /// action state reports, and only then the raw power state.
    pub fn from_axes(
        provisioning: ProvisioningState,
        power: PowerState,
        action: ActionState,
    ) -> Self {
        match provisioning {
            ProvisioningState::Failed | ProvisioningState::Canceled => return CompositeState::Error,
            ProvisioningState::NotStarted
            | ProvisioningState::Creating
            | ProvisioningState::Provisioning => return CompositeState::Creating,
            ProvisioningState::Deleting => return CompositeState::Deleting,
            ProvisioningState::Succeeded | ProvisioningState::Unknown => {}
        }

        match action {
            ActionState::Starting => return CompositeState::Starting,
            ActionState::Stopping => return CompositeState::Stopping,
            ActionState::Restarting => return CompositeState::Restarting,
            ActionState::Started | ActionState::Stopped | ActionState::Unknown => {}
        }

        match power {
            PowerState::Running => CompositeState::Running,
            PowerState::Hibernated => CompositeState::Saved,
            PowerState::Deallocated | PowerState::PoweredOff => CompositeState::Stopped,
            PowerState::Unknown => CompositeState::Unknown,
        }
    }

    /// Whether a host-initiated action is valid from this state.
    pub fn allows(self, action: WorkstationAction) -> bool {
        match action {
            WorkstationAction::Start => {
                matches!(self, CompositeState::Stopped | CompositeState::Saved)
            }
            WorkstationAction::Stop => {
                matches!(self, CompositeState::Running | CompositeState::Saved)
            }
            WorkstationAction::Restart => matches!(self, CompositeState::Running),
            WorkstationAction::Delete => matches!(
                self,
                CompositeState::Running
                    | CompositeState::Stopped
                    | CompositeState::Saved
                    | CompositeState::Error
            ),
            // Creation and provisioning watches are driven by the
            // orchestrator, never issued against an existing instance.
            WorkstationAction::Create | WorkstationAction::ProvisioningWatch => false,
        }
    }
}

impl fmt::Display for CompositeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositeState::Creating => "creating",
            CompositeState::Starting => "starting",
            CompositeState::Running => "running",
            CompositeState::Stopping => "stopping",
            CompositeState::Stopped => "stopped",
            CompositeState::Restarting => "restarting",
            CompositeState::Saved => "saved",
            CompositeState::Deleting => "deleting",
            CompositeState::Error => "in an error state",
            CompositeState::Unknown => "in an unknown state",
        };
        f.write_str(name)
    }
}
