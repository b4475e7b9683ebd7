//! Shared foundation for the cloud workstation extension core.
//!
//! This crate holds the pieces every other layer depends on: the error
//! taxonomy, the three remote status axes reported by the management plane,
//! the composite lifecycle state derived from them, and the set of actions
//! a workstation supports.

pub mod error;
pub mod state;

pub use error::{Result, WsError};
pub use state::{
    ActionState, CompositeState, OperationStatus, PowerState, ProvisioningState, WorkstationAction,
};
