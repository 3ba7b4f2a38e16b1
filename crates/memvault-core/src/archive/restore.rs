//! Contract for bringing archived memories back into the session hierarchy.
//!
//! memvault does not move files itself. A transport implementation owns cold
//! storage; once it reports a session as restored, that session's
//! `memory.md` must be discoverable again by the loader.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which archived sessions to restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "sessionIds")]
pub enum RestoreSelection {
    All,
    Sessions(Vec<String>),
}

impl RestoreSelection {
    pub fn includes(&self, session_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Sessions(ids) => ids.iter().any(|id| id == session_id),
        }
    }
}

/// Outcome counts of a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub restored: usize,
    pub failed: usize,
}

/// Moves archived memories back into the discoverable hierarchy.
#[async_trait]
pub trait RestoreTransport: Send + Sync {
    async fn restore(&self, selection: &RestoreSelection) -> Result<RestoreReport>;
}
