use alloy::primitives::Address;

use crate::engine::AllowlistEngine;
use crate::types::{AllowlistError, DecisionPath};

/// The checks a guarded token contract performs before mutating approval or
/// ownership state. Every engine failure is a denial; the guard never fails
/// open.
#[derive(Clone)]
pub struct TransferGuard {
    engine: AllowlistEngine,
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("{address} is not an allowlisted operator ({path})")]
    NotAllowlisted {
        address: Address,
        path: DecisionPath,
    },

    #[error("allowlist engine failed, denying by default: {0}")]
    Engine(#[from] AllowlistError),
}

impl TransferGuard {
    pub fn new(engine: AllowlistEngine) -> Self {
        Self { engine }
    }

    /// Guard for approve / setApprovalForAll equivalents.
    pub async fn validate_approval(&self, operator: Address) -> Result<(), GuardError> {
        self.check(operator).await
    }

    /// Guard for transferFrom equivalents. Both ends of the transfer must
    /// pass, so a delisted wallet can neither send nor receive.
    pub async fn validate_transfer(&self, from: Address, to: Address) -> Result<(), GuardError> {
        self.check(from).await?;
        self.check(to).await
    }

    async fn check(&self, address: Address) -> Result<(), GuardError> {
        let decision = self.engine.evaluate(address).await?;
        if decision.allowed {
            Ok(())
        } else {
            Err(GuardError::NotAllowlisted {
                address,
                path: decision.path,
            })
        }
    }
}
