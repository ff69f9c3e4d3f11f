//! Decision provider trait.

use async_trait::async_trait;
use crate::error::ProviderError;
use crate::types::{ProviderResponse, Transcript};

/// Abstraction for one party's decision source.
///
/// # Implementations
///
/// - **Production**: wraps a chat-completion API and maps tool calls to actions
/// - **Simulation**: scripted or seeded providers in `sealroom_sim`
///
/// # Call Flow
///
/// ```text
/// Orchestrator                 Provider
///   |                             |
///   |-- respond(&transcript) ---->|
///   |                             |-- [think, pick tools]
///   |<-- Ok(text + actions) ------|
///   |                             |
///   |-- apply actions, append tool results to transcript
/// ```
///
/// Calls are strictly sequential: the orchestrator awaits each response before
/// invoking the other party. Timeouts are the implementation's concern.
#[async_trait]
pub trait DecisionProvider: Send {
    /// The closed set of actions this party may request.
    type Action: Send;

    /// Produces the party's next message and the actions it wants applied.
    ///
    /// # Returns
    /// * `Ok(response)` - Text (possibly blank) and zero or more actions, in order
    /// * `Err(ProviderError)` - Transport or parse failure; treated as an empty turn
    async fn respond(
        &mut self,
        transcript: &Transcript,
    ) -> Result<ProviderResponse<Self::Action>, ProviderError>;

    /// Returns a short label for logging.
    fn name(&self) -> &str {
        "provider"
    }
}
