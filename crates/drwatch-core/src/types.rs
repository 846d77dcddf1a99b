use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DrError;

// ---------------------------------------------------------------------------
// StatusLevel
// ---------------------------------------------------------------------------

/// Health classification shared by every status component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusLevel {
    Operational,
    Degraded,
    Error,
    ConfigError,
}

impl StatusLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusLevel::Operational => "OPERATIONAL",
            StatusLevel::Degraded => "DEGRADED",
            StatusLevel::Error => "ERROR",
            StatusLevel::ConfigError => "CONFIG_ERROR",
        }
    }

    /// ERROR and CONFIG_ERROR both count as failing at the aggregate level.
    pub fn is_failing(self) -> bool {
        matches!(self, StatusLevel::Error | StatusLevel::ConfigError)
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TriggerMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMethod {
    #[default]
    ManualDashboard,
    Automatic,
}

impl TriggerMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerMethod::ManualDashboard => "manual_dashboard",
            TriggerMethod::Automatic => "automatic",
        }
    }
}

impl fmt::Display for TriggerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerMethod {
    type Err = DrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_dashboard" | "manual" => Ok(TriggerMethod::ManualDashboard),
            "automatic" | "auto" => Ok(TriggerMethod::Automatic),
            _ => Err(DrError::InvalidTriggerMethod(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// FailoverState
// ---------------------------------------------------------------------------

/// States of the failover workflow, in forward order.
///
/// `Failed` sorts last but is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailoverState {
    Init,
    Provisioning,
    Polling,
    Available,
    DnsUpdating,
    DnsUpdated,
    Failed,
}

impl FailoverState {
    pub fn all() -> &'static [FailoverState] {
        &[
            FailoverState::Init,
            FailoverState::Provisioning,
            FailoverState::Polling,
            FailoverState::Available,
            FailoverState::DnsUpdating,
            FailoverState::DnsUpdated,
            FailoverState::Failed,
        ]
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FailoverState::DnsUpdated | FailoverState::Failed)
    }

    /// Whether the workflow graph has an edge `self → target`.
    pub fn can_transition_to(self, target: FailoverState) -> bool {
        use FailoverState::*;
        match (self, target) {
            (from, Failed) => !from.is_terminal(),
            (Init, Provisioning)
            | (Provisioning, Polling)
            | (Polling, Polling)
            | (Polling, Available)
            | (Available, DnsUpdating)
            | (DnsUpdating, DnsUpdated) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailoverState::Init => "INIT",
            FailoverState::Provisioning => "PROVISIONING",
            FailoverState::Polling => "POLLING",
            FailoverState::Available => "AVAILABLE",
            FailoverState::DnsUpdating => "DNS_UPDATING",
            FailoverState::DnsUpdated => "DNS_UPDATED",
            FailoverState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for FailoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_level_serializes_screaming_case() {
        let json = serde_json::to_string(&StatusLevel::ConfigError).unwrap();
        assert_eq!(json, "\"CONFIG_ERROR\"");
    }

    #[test]
    fn forward_edges_are_allowed() {
        use FailoverState::*;
        assert!(Init.can_transition_to(Provisioning));
        assert!(Polling.can_transition_to(Polling));
        assert!(DnsUpdating.can_transition_to(DnsUpdated));
    }

    #[test]
    fn backward_and_skipping_edges_are_rejected() {
        use FailoverState::*;
        assert!(!Polling.can_transition_to(Provisioning));
        assert!(!Init.can_transition_to(Polling));
        assert!(!Available.can_transition_to(Available));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for &s in FailoverState::all() {
            assert!(!FailoverState::DnsUpdated.can_transition_to(s));
            assert!(!FailoverState::Failed.can_transition_to(s));
        }
    }

    #[test]
    fn failed_is_reachable_from_every_live_state() {
        for &s in FailoverState::all().iter().filter(|s| !s.is_terminal()) {
            assert!(s.can_transition_to(FailoverState::Failed), "{s}");
        }
    }

    #[test]
    fn trigger_method_parses_aliases() {
        assert_eq!(
            "manual".parse::<TriggerMethod>().unwrap(),
            TriggerMethod::ManualDashboard
        );
        assert_eq!(
            "automatic".parse::<TriggerMethod>().unwrap(),
            TriggerMethod::Automatic
        );
        assert!("sometimes".parse::<TriggerMethod>().is_err());
    }
}
