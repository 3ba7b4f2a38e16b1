//! Session memory records and the scores derived from them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A distilled record of one past work session.
///
/// Produced by the extraction step after a session finishes and never edited
/// in place; a newer session supersedes it with a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub session_id: String,
    pub node_id: String,
    pub node_name: String,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub ai_provider: String,
    #[serde(default)]
    pub token_count: u64,
    #[serde(default)]
    pub duration_minutes: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub current_state: Option<String>,
    #[serde(default)]
    pub task_spec: Option<String>,
    #[serde(default)]
    pub workflow: Option<String>,
    #[serde(default)]
    pub errors: Option<String>,
    #[serde(default)]
    pub learnings: Option<String>,
    #[serde(default)]
    pub key_results: Option<String>,
}

impl MemoryRecord {
    /// Number of content sections a record can carry.
    pub const SECTION_COUNT: usize = 7;

    /// A record with identifying fields set and every content section empty.
    pub fn new(
        session_id: impl Into<String>,
        node_id: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        let node_id = node_id.into();
        Self {
            session_id: session_id.into(),
            node_name: node_id.clone(),
            node_id,
            timestamp: Utc::now(),
            command: command.into(),
            ai_provider: String::new(),
            token_count: 0,
            duration_minutes: 0.0,
            tags: BTreeSet::new(),
            summary: String::new(),
            title: None,
            current_state: None,
            task_spec: None,
            workflow: None,
            errors: None,
            learnings: None,
            key_results: None,
        }
    }

    /// The seven content sections in canonical order.
    pub fn sections(&self) -> [Option<&str>; Self::SECTION_COUNT] {
        [
            self.title.as_deref(),
            self.current_state.as_deref(),
            self.task_spec.as_deref(),
            self.workflow.as_deref(),
            self.errors.as_deref(),
            self.learnings.as_deref(),
            self.key_results.as_deref(),
        ]
    }
}

/// True when a section holds something other than whitespace.
pub(crate) fn section_present(section: Option<&str>) -> bool {
    section.is_some_and(|s| !s.trim().is_empty())
}

/// Quality dimensions of a memory, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScore {
    pub overall: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub relevance_to_command: f64,
}

/// Direction of a memory's access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTrend {
    Increasing,
    #[default]
    Stable,
    Decreasing,
}

impl std::fmt::Display for AccessTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Stable => write!(f, "stable"),
            Self::Decreasing => write!(f, "decreasing"),
        }
    }
}

/// How often and how recently a memory was loaded into a new context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTracking {
    pub last_used: DateTime<Utc>,
    pub times_used: u32,
    pub access_trend: AccessTrend,
}
