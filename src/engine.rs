use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256};

use crate::chain::{classify_code, implementation_at, ChainStateReader};
use crate::registry::{AddressRegistry, BytecodeRegistry};
use crate::types::{AddressClass, AllowlistError, Decision, DecisionPath};

/// Composes the classifier and both registries into the single predicate
/// consumed by every guarded operation, plus the wallet-form registration
/// operations that need chain state to build a bytecode entry.
#[derive(Clone)]
pub struct AllowlistEngine {
    chain: Arc<dyn ChainStateReader>,
    bytecode: BytecodeRegistry,
    addresses: AddressRegistry,
    implementation_slot: B256,
}

impl AllowlistEngine {
    pub fn new(
        chain: Arc<dyn ChainStateReader>,
        bytecode: BytecodeRegistry,
        addresses: AddressRegistry,
        implementation_slot: B256,
    ) -> Self {
        Self {
            chain,
            bytecode,
            addresses,
            implementation_slot,
        }
    }

    pub fn bytecode(&self) -> &BytecodeRegistry {
        &self.bytecode
    }

    pub fn addresses(&self) -> &AddressRegistry {
        &self.addresses
    }

    /// Evaluation order is load-bearing and must not change: zero deny, EOA
    /// short-circuit, bytecode match, explicit address match, default deny.
    pub async fn evaluate(&self, target: Address) -> Result<Decision, AllowlistError> {
        if target == Address::ZERO {
            return Ok(Decision::deny(DecisionPath::ZeroAddress));
        }

        let code = self
            .chain
            .get_code(target)
            .await
            .map_err(|err| AllowlistError::ClassifierUnavailable(err.to_string()))?;

        // an undeployed counterfactual wallet lands here too, and is allowed
        // until its deployment shows up on chain
        if classify_code(&code) == AddressClass::Eoa {
            return Ok(Decision::allow(DecisionPath::Eoa));
        }

        let code_hash = keccak256(&code);
        let implementation =
            implementation_at(self.chain.as_ref(), target, self.implementation_slot).await?;
        if self.bytecode.is_allowed(code_hash, implementation).await? {
            return Ok(Decision::allow(DecisionPath::BytecodeMatch));
        }

        if self.addresses.is_allowed(target).await? {
            return Ok(Decision::allow(DecisionPath::AddressMatch));
        }

        Ok(Decision::deny(DecisionPath::DefaultDeny))
    }

    /// Boolean form of `evaluate`. Errors stay errors so callers can fail
    /// closed instead of mistaking an outage for a verdict.
    pub async fn is_allowed(&self, target: Address) -> Result<bool, AllowlistError> {
        Ok(self.evaluate(target).await?.allowed)
    }

    /// Registers a deployed wallet the way the on-chain registry does it:
    /// hash its deployed bytecode, read the implementation pointer out of the
    /// proxy slot, and bind the pair. Returns the registered codehash.
    pub async fn add_wallet(
        &self,
        principal: Address,
        wallet: Address,
    ) -> Result<B256, AllowlistError> {
        let (code_hash, implementation) = self.inspect_wallet(wallet).await?;
        self.bytecode
            .add_entry(principal, code_hash, implementation)
            .await?;
        Ok(code_hash)
    }

    /// Disables the bytecode entry matching the wallet's current deployed
    /// code. Returns the disabled codehash.
    pub async fn remove_wallet(
        &self,
        principal: Address,
        wallet: Address,
    ) -> Result<B256, AllowlistError> {
        let (code_hash, _) = self.inspect_wallet(wallet).await?;
        self.bytecode.remove_entry(principal, code_hash).await?;
        Ok(code_hash)
    }

    async fn inspect_wallet(&self, wallet: Address) -> Result<(B256, Address), AllowlistError> {
        if wallet == Address::ZERO {
            return Err(AllowlistError::InvalidAddress);
        }

        let code = self
            .chain
            .get_code(wallet)
            .await
            .map_err(|err| AllowlistError::ClassifierUnavailable(err.to_string()))?;
        // registering by code requires a deployment to read the code from
        if code.is_empty() {
            return Err(AllowlistError::InvalidAddress);
        }

        let implementation =
            implementation_at(self.chain.as_ref(), wallet, self.implementation_slot).await?;
        Ok((keccak256(&code), implementation))
    }
}
