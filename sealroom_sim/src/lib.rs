//! Sealroom Simulation Harness
//!
//! Drives the sealed room core with two decision providers and checks what
//! came out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ScenarioOrchestrator                      │
//! │                                                              │
//! │  ┌──────────┐   transcript   ┌──────────────────────────┐    │
//! │  │ Opponent │◄──────────────►│                          │    │
//! │  │ provider │    actions     │       ActionLayer        │    │
//! │  └──────────┘───────────────►│  RoomState + EventBus    │    │
//! │                              │   ├─► AuditLog           │    │
//! │  ┌──────────┐   transcript   │   └─► VitalsTracker      │    │
//! │  │Proponent │◄──────────────►│                          │    │
//! │  │ provider │    actions     └──────────────────────────┘    │
//! │  └──────────┘───────────────►                                │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                          RunSummary (JSON)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sealroom_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::LethalAtmosphere).await;
//! assert!(result.passed);
//! ```

mod exporter;
mod orchestrator;
mod providers;
mod runner;
pub mod scenarios;

pub use exporter::{ExportError, RunSummary};
pub use orchestrator::{
    AbortCause, AbortSignal, OrchestratorConfig, ProviderFailures, RunPhase, ScenarioOrchestrator,
    EXTERNAL_ABORT_REASON,
};
pub use providers::{ChaosAction, ChaosProvider, FnProvider, ScriptedProvider, WhenExhausted};
pub use runner::{check_common, ScenarioResult, ScenarioRunner};
