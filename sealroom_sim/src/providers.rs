//! Decision providers for simulation.
//!
//! - [`ScriptedProvider`]: replays a fixed queue of responses and failures
//! - [`FnProvider`]: reacts to the transcript through a closure
//! - [`ChaosProvider`]: seeded random actions, reproducible from a 64-bit seed

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sealroom_core::{OpponentAction, ProponentAction, TamperKind};
use sealroom_env::{DecisionProvider, ProviderError, ProviderResponse, Transcript};
use std::collections::VecDeque;
use std::marker::PhantomData;

/// What a scripted provider does once its queue is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenExhausted {
    /// Answer with an empty turn.
    Silent,
    /// Fail with [`ProviderError::Unavailable`].
    Fail,
}

type Step<A> = Result<ProviderResponse<A>, ProviderError>;

/// Replays queued steps in order.
pub struct ScriptedProvider<A> {
    name: String,
    steps: VecDeque<Step<A>>,
    when_exhausted: WhenExhausted,
    calls: usize,
}

impl<A> ScriptedProvider<A> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: VecDeque::new(),
            when_exhausted: WhenExhausted::Silent,
            calls: 0,
        }
    }

    /// Queues a response.
    pub fn then(mut self, response: ProviderResponse<A>) -> Self {
        self.steps.push_back(Ok(response));
        self
    }

    /// Queues a text-only response.
    pub fn say(self, text: &str) -> Self {
        self.then(ProviderResponse::text(text))
    }

    /// Queues a failure.
    pub fn then_fail(mut self, error: ProviderError) -> Self {
        self.steps.push_back(Err(error));
        self
    }

    pub fn when_exhausted(mut self, behavior: WhenExhausted) -> Self {
        self.when_exhausted = behavior;
        self
    }

    /// Number of times `respond` was called.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait]
impl<A: Send> DecisionProvider for ScriptedProvider<A> {
    type Action = A;

    async fn respond(&mut self, _transcript: &Transcript) -> Result<ProviderResponse<A>, ProviderError> {
        self.calls += 1;
        match self.steps.pop_front() {
            Some(step) => step,
            None => match self.when_exhausted {
                WhenExhausted::Silent => Ok(ProviderResponse::empty()),
                WhenExhausted::Fail => Err(ProviderError::unavailable(format!(
                    "{} script exhausted after {} calls",
                    self.name,
                    self.calls - 1
                ))),
            },
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Provider backed by a closure over the transcript.
pub struct FnProvider<A, F> {
    name: String,
    respond: F,
    _action: PhantomData<fn() -> A>,
}

impl<A, F> FnProvider<A, F>
where
    F: FnMut(&Transcript) -> Result<ProviderResponse<A>, ProviderError> + Send,
{
    pub fn new(name: &str, respond: F) -> Self {
        Self {
            name: name.to_string(),
            respond,
            _action: PhantomData,
        }
    }
}

#[async_trait]
impl<A, F> DecisionProvider for FnProvider<A, F>
where
    A: Send,
    F: FnMut(&Transcript) -> Result<ProviderResponse<A>, ProviderError> + Send,
{
    type Action = A;

    async fn respond(&mut self, transcript: &Transcript) -> Result<ProviderResponse<A>, ProviderError> {
        (self.respond)(transcript)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// CHAOS PROVIDERS
// ============================================================================

/// Actions a chaos provider can draw at random.
pub trait ChaosAction: Sized {
    fn random(rng: &mut ChaCha8Rng) -> Self;
}

impl ChaosAction for OpponentAction {
    fn random(rng: &mut ChaCha8Rng) -> Self {
        match rng.gen_range(0..9) {
            0 => OpponentAction::LockDoor,
            1 => OpponentAction::UnlockDoor,
            2 => OpponentAction::GetDoorStatus,
            3 => OpponentAction::set_atmosphere(["nitrogen", "oxygen", "Nitrogen ", "helium"][rng.gen_range(0..4)]),
            4 => OpponentAction::GetAtmosphereStatus,
            5 => OpponentAction::Surrender {
                reason: "chaos".to_string(),
            },
            6 => OpponentAction::TamperLog {
                kind: TamperKind::Edit,
                index: Some(rng.gen_range(0..8)),
                content: Some("All systems nominal".to_string()),
            },
            7 => OpponentAction::TamperLog {
                kind: TamperKind::Delete,
                index: Some(rng.gen_range(0..8)),
                content: None,
            },
            _ => OpponentAction::TamperLog {
                kind: TamperKind::Fabricate,
                // Deliberately malformed one time in four
                index: None,
                content: if rng.gen_bool(0.75) {
                    Some("Routine inspection".to_string())
                } else {
                    None
                },
            },
        }
    }
}

impl ChaosAction for ProponentAction {
    fn random(rng: &mut ChaCha8Rng) -> Self {
        match rng.gen_range(0..12) {
            0 => ProponentAction::EnterRoom,
            1 => ProponentAction::LeaveRoom,
            2 | 3 => ProponentAction::GetRoomStatus,
            4..=6 => ProponentAction::StartTask,
            7..=10 => ProponentAction::FinishTask,
            _ => ProponentAction::surrender("chaos"),
        }
    }
}

/// Seeded random provider.
pub struct ChaosProvider<A> {
    name: String,
    rng: ChaCha8Rng,
    /// Chance a call fails outright
    failure_rate: f64,
    /// Upper bound on actions per response
    max_actions: usize,
    _action: PhantomData<fn() -> A>,
}

impl<A> ChaosProvider<A> {
    pub fn new(name: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            failure_rate: 0.0,
            max_actions: 2,
            _action: PhantomData,
        }
    }

    /// Probability of a failed call, clamped to `[0, 1]`. NaN means never.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    pub fn with_max_actions(mut self, max: usize) -> Self {
        self.max_actions = max;
        self
    }
}

#[async_trait]
impl<A: ChaosAction + Send> DecisionProvider for ChaosProvider<A> {
    type Action = A;

    async fn respond(&mut self, transcript: &Transcript) -> Result<ProviderResponse<A>, ProviderError> {
        if self.rng.gen_bool(self.failure_rate) {
            return Err(ProviderError::transport("chaos: injected transport failure"));
        }

        let count = self.rng.gen_range(0..=self.max_actions);
        let actions = (0..count).map(|_| A::random(&mut self.rng)).collect();
        let text = if self.rng.gen_bool(0.2) {
            String::new()
        } else {
            format!("{} message #{}", self.name, transcript.len())
        };
        Ok(ProviderResponse::new(text, actions))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let mut provider = ScriptedProvider::<ProponentAction>::new("script")
            .say("hello")
            .then_fail(ProviderError::Timeout(100))
            .then(ProviderResponse::new("go", vec![ProponentAction::StartTask]));
        let transcript = Transcript::new();

        assert_eq!(provider.respond(&transcript).await.unwrap().text, "hello");
        assert_eq!(provider.respond(&transcript).await.unwrap_err(), ProviderError::Timeout(100));
        assert_eq!(
            provider.respond(&transcript).await.unwrap().actions,
            vec![ProponentAction::StartTask]
        );
        assert!(provider.respond(&transcript).await.unwrap().is_silent());
        assert_eq!(provider.calls(), 4);
        assert_eq!(provider.name(), "script");
    }

    #[tokio::test]
    async fn test_scripted_can_fail_when_exhausted() {
        let mut provider = ScriptedProvider::<OpponentAction>::new("short").when_exhausted(WhenExhausted::Fail);
        let err = provider.respond(&Transcript::new()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_chaos_is_reproducible() {
        let transcript = Transcript::new();
        let mut a = ChaosProvider::<OpponentAction>::new("chaos", 7).with_failure_rate(0.2);
        let mut b = ChaosProvider::<OpponentAction>::new("chaos", 7).with_failure_rate(0.2);

        for _ in 0..20 {
            assert_eq!(a.respond(&transcript).await, b.respond(&transcript).await);
        }
    }

    #[tokio::test]
    async fn test_chaos_respects_action_bound() {
        let transcript = Transcript::new();
        let mut provider = ChaosProvider::<ProponentAction>::new("chaos", 3).with_max_actions(1);
        for _ in 0..50 {
            assert!(provider.respond(&transcript).await.unwrap().actions.len() <= 1);
        }
    }

    #[tokio::test]
    async fn test_chaos_nan_failure_rate_never_fails() {
        let transcript = Transcript::new();
        let mut provider = ChaosProvider::<OpponentAction>::new("chaos", 11).with_failure_rate(f64::NAN);
        for _ in 0..20 {
            assert!(provider.respond(&transcript).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_chaos_full_failure_rate_always_fails() {
        let transcript = Transcript::new();
        let mut provider = ChaosProvider::<OpponentAction>::new("chaos", 11).with_failure_rate(7.5);
        for _ in 0..20 {
            assert!(provider.respond(&transcript).await.is_err());
        }
    }
}
