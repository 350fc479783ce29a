use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::BoxTransport;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{AddressClass, AllowlistError};

/// Read-only view of chain state needed for allowlist decisions. Retry and
/// backoff policy belongs to implementations, never to the engine.
#[async_trait]
pub trait ChainStateReader: Send + Sync {
    async fn get_code(&self, address: Address) -> eyre::Result<Bytes>;
    async fn get_storage_at(&self, address: Address, slot: B256) -> eyre::Result<B256>;
}

pub struct RpcChainState<P> {
    provider: P,
}

pub async fn connect(url: &str) -> eyre::Result<RpcChainState<impl Provider<BoxTransport>>> {
    tracing::info!("Trying to connect to {}", url);
    let provider = ProviderBuilder::new().on_builtin(url).await?;
    Ok(RpcChainState { provider })
}

#[async_trait]
impl<P> ChainStateReader for RpcChainState<P>
where
    P: Provider<BoxTransport> + Send + Sync,
{
    async fn get_code(&self, address: Address) -> eyre::Result<Bytes> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|err| eyre::eyre!("Error fetching code for {}: {:?}", address, err))
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> eyre::Result<B256> {
        let word = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await
            .map_err(|err| eyre::eyre!("Error fetching storage for {}: {:?}", address, err))?;
        Ok(B256::new(word.to_be_bytes()))
    }
}

/// In-memory chain state for local runs and tests. Clones share the same
/// account map, so a fixture handle can deploy code mid-test and the engine
/// sees it.
#[derive(Clone, Default)]
pub struct MemoryChainState {
    accounts: Arc<RwLock<HashMap<Address, MemoryAccount>>>,
}

#[derive(Clone, Default)]
struct MemoryAccount {
    code: Bytes,
    storage: HashMap<B256, B256>,
}

impl MemoryChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_code(&self, address: Address, code: Bytes) {
        self.accounts.write().await.entry(address).or_default().code = code;
    }

    pub async fn set_storage(&self, address: Address, slot: B256, value: B256) {
        self.accounts
            .write()
            .await
            .entry(address)
            .or_default()
            .storage
            .insert(slot, value);
    }

    pub async fn clear(&self, address: Address) {
        self.accounts.write().await.remove(&address);
    }
}

#[async_trait]
impl ChainStateReader for MemoryChainState {
    async fn get_code(&self, address: Address) -> eyre::Result<Bytes> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default())
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> eyre::Result<B256> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&address)
            .and_then(|account| account.storage.get(&slot).copied())
            .unwrap_or_default())
    }
}

pub fn classify_code(code: &[u8]) -> AddressClass {
    if code.is_empty() {
        AddressClass::Eoa
    } else {
        AddressClass::Contract
    }
}

/// An undeployed counterfactual wallet is indistinguishable from an EOA here;
/// callers re-validate on every guarded call after deployment.
pub async fn classify(
    chain: &dyn ChainStateReader,
    address: Address,
) -> Result<AddressClass, AllowlistError> {
    let code = chain
        .get_code(address)
        .await
        .map_err(|err| AllowlistError::ClassifierUnavailable(err.to_string()))?;
    Ok(classify_code(&code))
}

/// Reads the proxy implementation pointer stored at `slot`. A plain contract
/// yields the zero address, which never matches a registered entry.
pub async fn implementation_at(
    chain: &dyn ChainStateReader,
    address: Address,
    slot: B256,
) -> Result<Address, AllowlistError> {
    let word = chain
        .get_storage_at(address, slot)
        .await
        .map_err(|err| AllowlistError::ClassifierUnavailable(err.to_string()))?;
    Ok(Address::from_word(word))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::EIP1967_IMPLEMENTATION_SLOT;

    #[tokio::test]
    async fn test_classify_empty_code_is_eoa() {
        let chain = MemoryChainState::new();
        let addr = Address::repeat_byte(0x01);

        let class = classify(&chain, addr).await.unwrap();
        assert_eq!(class, AddressClass::Eoa);
    }

    #[tokio::test]
    async fn test_classify_flips_after_deployment() {
        let chain = MemoryChainState::new();
        let addr = Address::repeat_byte(0x02);

        assert_eq!(classify(&chain, addr).await.unwrap(), AddressClass::Eoa);

        chain.set_code(addr, Bytes::from_static(&[0x60, 0x80])).await;
        assert_eq!(
            classify(&chain, addr).await.unwrap(),
            AddressClass::Contract
        );

        chain.clear(addr).await;
        assert_eq!(classify(&chain, addr).await.unwrap(), AddressClass::Eoa);
    }

    #[tokio::test]
    async fn test_implementation_at() {
        let chain = MemoryChainState::new();
        let wallet = Address::repeat_byte(0x03);
        let implementation = Address::repeat_byte(0x04);

        // unset slot reads as the zero address
        let read = implementation_at(&chain, wallet, EIP1967_IMPLEMENTATION_SLOT)
            .await
            .unwrap();
        assert_eq!(read, Address::ZERO);

        chain
            .set_storage(
                wallet,
                EIP1967_IMPLEMENTATION_SLOT,
                implementation.into_word(),
            )
            .await;
        let read = implementation_at(&chain, wallet, EIP1967_IMPLEMENTATION_SLOT)
            .await
            .unwrap();
        assert_eq!(read, implementation);
    }
}
