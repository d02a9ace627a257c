//! Remote-state classifiers.
//!
//! Each remote object family reports its own lifecycle states. The functions
//! here turn the state an object settled in into diagnostics: nothing on
//! success, a warning when the object exists but needs outside action, and
//! a fatal [`errmsg::SUMMARY_TERMINAL_STATE`] error when it can never become
//! usable. The lifecycle adapter rolls a create back on that summary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use provix_core::{errmsg, Diagnostics};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A state string no classifier knows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown remote state {0:?}")]
pub struct UnknownState(pub String);

/// Lifecycle of a VPC peering connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeeringState {
    Approved,
    Active,
    PendingPeer,
    RejectedByPeer,
    InvalidSpecification,
    Deleting,
    Deleted,
    DeletedByPeer,
}

impl PeeringState {
    pub const ALL: [PeeringState; 8] = [
        PeeringState::Approved,
        PeeringState::Active,
        PeeringState::PendingPeer,
        PeeringState::RejectedByPeer,
        PeeringState::InvalidSpecification,
        PeeringState::Deleting,
        PeeringState::Deleted,
        PeeringState::DeletedByPeer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeeringState::Approved => "APPROVED",
            PeeringState::Active => "ACTIVE",
            PeeringState::PendingPeer => "PENDING_PEER",
            PeeringState::RejectedByPeer => "REJECTED_BY_PEER",
            PeeringState::InvalidSpecification => "INVALID_SPECIFICATION",
            PeeringState::Deleting => "DELETING",
            PeeringState::Deleted => "DELETED",
            PeeringState::DeletedByPeer => "DELETED_BY_PEER",
        }
    }

    /// States that end the post-create wait: everything but `APPROVED`.
    pub fn build_targets() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|s| **s != PeeringState::Approved)
            .map(PeeringState::as_str)
            .collect()
    }

    /// States that keep the delete wait going: everything but `DELETED`.
    pub fn delete_pending() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|s| **s != PeeringState::Deleted)
            .map(PeeringState::as_str)
            .collect()
    }
}

impl fmt::Display for PeeringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeeringState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// Render the remote `state_info` map, `message` first.
pub fn state_info_to_string(info: &BTreeMap<String, String>) -> String {
    let mut out = info.get("message").cloned().unwrap_or_default();
    for (k, v) in info.iter().filter(|(k, _)| k.as_str() != "message") {
        out.push_str(&format!("\n {k:?}:{v:?}"));
    }
    out
}

/// Classify the state a peering connection settled in after create.
pub fn classify_peering(state: &str, state_info: &BTreeMap<String, String>) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let info = state_info_to_string(state_info);

    match state.parse::<PeeringState>() {
        Ok(PeeringState::Active) => {}
        Ok(PeeringState::PendingPeer) => diags.add_warning(
            errmsg::SUMMARY_PENDING_ACTION,
            format!(
                "The peering connection was created in the cloud, but it is not active until the \
                 peer completes the setup in their cloud account. Find more in the state info: {info}"
            ),
        ),
        Ok(PeeringState::RejectedByPeer) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!("VPC peering connection request was rejected, state info: {info}"),
        ),
        Ok(PeeringState::InvalidSpecification) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!("VPC peering connection cannot be created, more in the state info: {info}"),
        ),
        Ok(PeeringState::Deleting) | Ok(PeeringState::Deleted) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!(
                "The peering connection was deleted right after it was created (state {state}). \
                 There are no transitions from this state"
            ),
        ),
        Ok(PeeringState::DeletedByPeer) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            "The peer deleted the peering cloud resource in their account. There are no transitions from this state",
        ),
        Ok(PeeringState::Approved) | Err(_) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!("Unknown VPC peering connection state: {state}"),
        ),
    }
    diags
}

/// Lifecycle of a project VPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VpcState {
    Approved,
    Active,
    Deleting,
    Deleted,
}

impl VpcState {
    pub const ALL: [VpcState; 4] = [VpcState::Approved, VpcState::Active, VpcState::Deleting, VpcState::Deleted];

    pub fn as_str(&self) -> &'static str {
        match self {
            VpcState::Approved => "APPROVED",
            VpcState::Active => "ACTIVE",
            VpcState::Deleting => "DELETING",
            VpcState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for VpcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VpcState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

pub fn classify_vpc(state: &str) -> Diagnostics {
    let mut diags = Diagnostics::new();
    match state.parse::<VpcState>() {
        Ok(VpcState::Active) => {}
        Ok(VpcState::Deleting) | Ok(VpcState::Deleted) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!("The project VPC was deleted right after it was created (state {state})"),
        ),
        Ok(VpcState::Approved) | Err(_) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!("Unknown project VPC state: {state}"),
        ),
    }
    diags
}

/// Lifecycle of a managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Running,
    Rebuilding,
    Rebalancing,
    WaitingForServices,
    Poweroff,
}

impl ServiceState {
    pub const ALL: [ServiceState; 5] = [
        ServiceState::Running,
        ServiceState::Rebuilding,
        ServiceState::Rebalancing,
        ServiceState::WaitingForServices,
        ServiceState::Poweroff,
    ];

    /// States a service passes through on its way to `RUNNING`.
    pub const PENDING: [ServiceState; 3] = [
        ServiceState::Rebuilding,
        ServiceState::Rebalancing,
        ServiceState::WaitingForServices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Running => "RUNNING",
            ServiceState::Rebuilding => "REBUILDING",
            ServiceState::Rebalancing => "REBALANCING",
            ServiceState::WaitingForServices => "WAITING_FOR_SERVICES",
            ServiceState::Poweroff => "POWEROFF",
        }
    }

    pub fn is_pending(&self) -> bool {
        Self::PENDING.contains(self)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

pub fn classify_service(service_name: &str, state: &str) -> Diagnostics {
    let mut diags = Diagnostics::new();
    match state.parse::<ServiceState>() {
        Ok(ServiceState::Running) => {}
        Ok(ServiceState::Poweroff) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!(
                "Service {service_name:?} is powered off. Services cannot be powered on from here, \
                 power it on from the console or the CLI"
            ),
        ),
        Ok(pending) => diags.add_error(
            errmsg::SUMMARY_CONVERGENCE_TIMEOUT,
            format!("Service {service_name:?} is still {pending}"),
        ),
        Err(err) => diags.add_error(errmsg::SUMMARY_TERMINAL_STATE, format!("Service {service_name:?}: {err}")),
    }
    diags
}

/// Lifecycle of a privatelink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivatelinkState {
    Creating,
    Active,
    Deleting,
}

impl PrivatelinkState {
    pub const ALL: [PrivatelinkState; 3] = [
        PrivatelinkState::Creating,
        PrivatelinkState::Active,
        PrivatelinkState::Deleting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivatelinkState::Creating => "creating",
            PrivatelinkState::Active => "active",
            PrivatelinkState::Deleting => "deleting",
        }
    }
}

impl fmt::Display for PrivatelinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivatelinkState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

pub fn classify_privatelink(state: &str) -> Diagnostics {
    let mut diags = Diagnostics::new();
    match state.parse::<PrivatelinkState>() {
        Ok(PrivatelinkState::Active) => {}
        Ok(PrivatelinkState::Deleting) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            "The privatelink is being deleted and cannot become active",
        ),
        Ok(PrivatelinkState::Creating) | Err(_) => diags.add_error(
            errmsg::SUMMARY_TERMINAL_STATE,
            format!("Unknown privatelink state: {state}"),
        ),
    }
    diags
}
