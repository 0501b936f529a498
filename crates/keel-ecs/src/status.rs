//! Lifecycle status vocabulary.
//!
//! Tasks and containers move through a richer set of states locally than the
//! control plane accepts. Only two remote statuses exist:
//!
//! ```text
//!   local state            remote status
//!   ───────────            ─────────────
//!   Running        ──────▶ RUNNING
//!   Stopped, Dead  ──────▶ STOPPED
//!   None, Pulled,
//!   Created        ──────▶ (not reported)
//! ```
//!
//! Transitions into unreported states are skipped without contacting the
//! control plane.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A status the control plane accepts in a state change report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteStatus {
    /// The task or container is running.
    Running,
    /// The task or container has stopped.
    Stopped,
}

impl RemoteStatus {
    /// The wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// No status has been assigned yet.
    #[default]
    None,
    /// Images for the task have been pulled.
    Pulled,
    /// Containers for the task have been created.
    Created,
    /// The task is running.
    Running,
    /// The task has stopped.
    Stopped,
    /// The task is gone and its resources released.
    Dead,
}

impl TaskStatus {
    /// The upper-case name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Pulled => "PULLED",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Dead => "DEAD",
        }
    }

    /// Returns false for the unset state.
    #[must_use]
    pub const fn is_set(self) -> bool {
        !matches!(self, Self::None)
    }

    /// The remote status this state is reported as, if any.
    #[must_use]
    pub const fn remote(self) -> Option<RemoteStatus> {
        match self {
            Self::Running => Some(RemoteStatus::Running),
            Self::Stopped | Self::Dead => Some(RemoteStatus::Stopped),
            Self::None | Self::Pulled | Self::Created => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerStatus {
    /// No status has been assigned yet.
    #[default]
    None,
    /// The container image has been pulled.
    Pulled,
    /// The container has been created.
    Created,
    /// The container is running.
    Running,
    /// The container has stopped.
    Stopped,
    /// The container is gone.
    Dead,
}

impl ContainerStatus {
    /// The upper-case name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Pulled => "PULLED",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Dead => "DEAD",
        }
    }

    /// The remote status this state is reported as, if any.
    #[must_use]
    pub const fn remote(self) -> Option<RemoteStatus> {
        match self {
            Self::Running => Some(RemoteStatus::Running),
            Self::Stopped | Self::Dead => Some(RemoteStatus::Stopped),
            Self::None | Self::Pulled | Self::Created => None,
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
