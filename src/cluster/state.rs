//! Lifecycle states of a mini cluster.

use std::fmt;

/// `Created` at construction, `Started` after a successful `start()`,
/// `Stopped` after `stop()`. There is no way back from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterState {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.pad(name)
    }
}
