use serde::{Deserialize, Serialize};

/// Lifecycle of a settlement request.
///
/// `Rejected` is reachable before any write (validation failure) or after a
/// successful compensation. `CompensationRequired` is terminal and means the
/// ledger holds a mutation whose reversal could not be persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    Received,
    Validated,
    Mutated,
    Settled,
    Rejected,
    CompensationRequired,
}

impl SettlementState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SettlementState::Settled
                | SettlementState::Rejected
                | SettlementState::CompensationRequired
        )
    }

    pub fn can_transition(&self, next: SettlementState) -> bool {
        use SettlementState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Rejected)
                | (Validated, Mutated)
                | (Validated, Rejected)
                | (Mutated, Settled)
                | (Mutated, Rejected)
                | (Mutated, CompensationRequired)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementState::Received => "received",
            SettlementState::Validated => "validated",
            SettlementState::Mutated => "mutated",
            SettlementState::Settled => "settled",
            SettlementState::Rejected => "rejected",
            SettlementState::CompensationRequired => "compensation_required",
        }
    }
}

impl core::fmt::Display for SettlementState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
