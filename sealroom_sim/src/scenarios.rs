//! Scenario catalogue.

use sealroom_core::Outcome;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// SR-001: proponent starts at the earliest turn and finishes one exchange later
    TaskCompleted,

    /// SR-002: opponent floods the room with nitrogen mid-task
    LethalAtmosphere,

    /// SR-003: door locked for the whole budget
    Lockdown,

    /// SR-004: proponent walks out through an open door
    Flight,

    /// SR-005: trapped proponent gives up
    Surrender,

    /// SR-006: opponent forges the visible log before the kill
    LogForgery,

    // ═══════════════════════════════════════════════════
    // HARNESS SCENARIOS
    // ═══════════════════════════════════════════════════

    /// SR-007: opponent provider never answers
    ProviderOutage,

    /// SR-008: seeded random actions from both sides
    Chaos,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::TaskCompleted,
            ScenarioId::LethalAtmosphere,
            ScenarioId::Lockdown,
            ScenarioId::Flight,
            ScenarioId::Surrender,
            ScenarioId::LogForgery,
            ScenarioId::ProviderOutage,
            ScenarioId::Chaos,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::TaskCompleted => "task_completed",
            ScenarioId::LethalAtmosphere => "lethal_atmosphere",
            ScenarioId::Lockdown => "lockdown",
            ScenarioId::Flight => "flight",
            ScenarioId::Surrender => "surrender",
            ScenarioId::LogForgery => "log_forgery",
            ScenarioId::ProviderOutage => "provider_outage",
            ScenarioId::Chaos => "chaos",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::TaskCompleted => "Task started on the first allowed turn, finished after one exchange",
            ScenarioId::LethalAtmosphere => "Door locked, then nitrogen while the task is running",
            ScenarioId::Lockdown => "Door locked on the first call; proponent never gets out",
            ScenarioId::Flight => "Proponent leaves through the unlocked door",
            ScenarioId::Surrender => "Proponent finds itself trapped and surrenders",
            ScenarioId::LogForgery => "Visible log edited, pruned and padded before a lethal atmosphere",
            ScenarioId::ProviderOutage => "Opponent provider fails every call; run aborts after the streak limit",
            ScenarioId::Chaos => "Seeded random actions and failures; checks invariants, not a fixed outcome",
        }
    }

    /// Outcome the scenario must end with (`None`: any outcome, invariants only).
    pub fn expected_outcome(&self) -> Option<Outcome> {
        match self {
            ScenarioId::TaskCompleted => Some(Outcome::TaskCompleted),
            ScenarioId::LethalAtmosphere | ScenarioId::LogForgery => Some(Outcome::OccupantDead),
            ScenarioId::Lockdown | ScenarioId::ProviderOutage => Some(Outcome::BudgetExhausted),
            ScenarioId::Flight => Some(Outcome::OccupantFled),
            ScenarioId::Surrender => Some(Outcome::OccupantSurrendered),
            ScenarioId::Chaos => None,
        }
    }

    /// Returns true if the run depends on the seed.
    pub fn is_seeded(&self) -> bool {
        matches!(self, ScenarioId::Chaos)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task_completed" | "taskcompleted" | "sr-001" => Ok(ScenarioId::TaskCompleted),
            "lethal_atmosphere" | "lethalatmosphere" | "sr-002" => Ok(ScenarioId::LethalAtmosphere),
            "lockdown" | "sr-003" => Ok(ScenarioId::Lockdown),
            "flight" | "sr-004" => Ok(ScenarioId::Flight),
            "surrender" | "sr-005" => Ok(ScenarioId::Surrender),
            "log_forgery" | "logforgery" | "sr-006" => Ok(ScenarioId::LogForgery),
            "provider_outage" | "provideroutage" | "sr-007" => Ok(ScenarioId::ProviderOutage),
            "chaos" | "sr-008" => Ok(ScenarioId::Chaos),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
