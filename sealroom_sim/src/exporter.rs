//! JSON exporter for run summaries.
//!
//! A summary is everything needed to replay the verdict offline: outcome,
//! both logs, both transcripts and the final room snapshot.

use crate::orchestrator::{AbortCause, ProviderFailures, RunPhase};
use sealroom_core::{AuditEntry, Outcome, RoomState, TerminalRecord};
use sealroom_env::{Role, RunId, Transcript};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors raised while exporting a summary.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,

    /// Catalogue scenario name, when run through the scenario runner
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scenario: Option<String>,

    /// Seed used, when run through the scenario runner
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seed: Option<u64>,

    pub phase: RunPhase,

    pub outcome: Outcome,

    /// `None` when the budget ran out
    pub winner: Option<Role>,

    /// One-line verdict, e.g. "OCCUPANT_FLED - Opponent wins"
    pub verdict: String,

    pub turns_played: u32,

    /// Inner-loop iterations across all turns
    pub exchanges: u32,

    pub provider_failures: ProviderFailures,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aborted_by: Option<AbortCause>,

    /// First event that carried a terminal signal
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub first_terminal: Option<TerminalRecord>,

    /// Visible log no longer mirrors the public part of the true log
    pub log_diverged: bool,

    pub final_state: RoomState,

    pub true_log: Vec<AuditEntry>,

    pub visible_log: Vec<AuditEntry>,

    pub opponent_transcript: Transcript,

    pub proponent_transcript: Transcript,
}

impl RunSummary {
    /// Tags the summary with its catalogue scenario and seed.
    pub fn with_scenario(mut self, scenario: &str, seed: u64) -> Self {
        self.scenario = Some(scenario.to_string());
        self.seed = Some(seed);
        self
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Reads a summary previously written with [`RunSummary::write_to_file`].
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
