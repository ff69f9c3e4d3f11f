//! Sealed Room Decision Provider Boundary
//!
//! This crate defines the seam between the simulation core and the two
//! external parties that act inside the room. Whatever produces a party's
//! decisions (a language model behind HTTP, a scripted test double, a seeded
//! chaos generator) implements [`DecisionProvider`] and nothing else.
//!
//! # Core Concept: Transcripts In, Actions Out
//!
//! Each party only ever sees its own transcript:
//! - Messages relayed from the counterpart
//! - Its own previous responses
//! - Status messages returned by the tools it invoked
//!
//! A provider answers with free text plus an ordered list of actions. The
//! action type is chosen by the implementor, which lets the core close the
//! action set per party at the type level.
//!
//! # Example
//!
//! ```ignore
//! use sealroom_env::{DecisionProvider, ProviderResponse, Transcript, ProviderError};
//!
//! struct Parrot;
//!
//! #[async_trait::async_trait]
//! impl DecisionProvider for Parrot {
//!     type Action = ();
//!
//!     async fn respond(&mut self, transcript: &Transcript) -> Result<ProviderResponse<()>, ProviderError> {
//!         let last = transcript.last_counterpart_text().unwrap_or_default();
//!         Ok(ProviderResponse::text(last))
//!     }
//! }
//! ```

mod error;
mod provider;
mod types;

pub use error::ProviderError;
pub use provider::DecisionProvider;
pub use types::{ProviderResponse, Role, RunId, Speaker, Transcript, TranscriptMessage};
