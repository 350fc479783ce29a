use std::sync::Arc;

use alloy::primitives::{Address, B256};
use tokio::sync::Mutex;

use crate::auth::{require, Authorizer};
use crate::events::EventBus;
use crate::storage::{AllowlistStore, Reader, Writer};
use crate::types::{AddressEntry, AllowlistError, AllowlistEvent, BytecodeEntry, Capability};

/// Codehash-keyed registry for proxy-style smart contract wallets. Add is
/// fail-fast on double registration and remove is fail-fast on absent
/// entries, so integration bugs surface instead of being masked.
#[derive(Clone)]
pub struct BytecodeRegistry {
    store: AllowlistStore,
    authorizer: Arc<dyn Authorizer>,
    events: EventBus,
    write_lock: Arc<Mutex<()>>,
}

impl BytecodeRegistry {
    pub fn new(store: AllowlistStore, authorizer: Arc<dyn Authorizer>, events: EventBus) -> Self {
        Self {
            store,
            authorizer,
            events,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn add_entry(
        &self,
        principal: Address,
        code_hash: B256,
        implementation: Address,
    ) -> Result<(), AllowlistError> {
        require(self.authorizer.as_ref(), principal, Capability::Registrar).await?;
        if implementation == Address::ZERO {
            return Err(AllowlistError::InvalidAddress);
        }

        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self
            .store
            .bytecode_entry(code_hash)
            .await
            .map_err(AllowlistError::storage)?
        {
            if existing.allowed {
                return Err(AllowlistError::AlreadyRegistered(code_hash));
            }
        }

        self.store
            .put_bytecode_entry(&BytecodeEntry {
                code_hash,
                implementation,
                allowed: true,
            })
            .await
            .map_err(AllowlistError::storage)?;
        self.emit(AllowlistEvent::bytecode(code_hash, implementation, true))
            .await
    }

    pub async fn remove_entry(
        &self,
        principal: Address,
        code_hash: B256,
    ) -> Result<(), AllowlistError> {
        require(self.authorizer.as_ref(), principal, Capability::Registrar).await?;

        let _guard = self.write_lock.lock().await;
        let entry = match self
            .store
            .bytecode_entry(code_hash)
            .await
            .map_err(AllowlistError::storage)?
        {
            Some(entry) if entry.allowed => entry,
            _ => return Err(AllowlistError::NotRegistered(code_hash)),
        };

        self.store
            .put_bytecode_entry(&BytecodeEntry {
                allowed: false,
                ..entry.clone()
            })
            .await
            .map_err(AllowlistError::storage)?;
        self.emit(AllowlistEvent::bytecode(
            code_hash,
            entry.implementation,
            false,
        ))
        .await
    }

    /// True iff the stored entry is allowed and bound to this exact
    /// implementation. The double check defeats wallets that share deployed
    /// bytecode but proxy to different logic.
    pub async fn is_allowed(
        &self,
        code_hash: B256,
        implementation: Address,
    ) -> Result<bool, AllowlistError> {
        let entry = self
            .store
            .bytecode_entry(code_hash)
            .await
            .map_err(AllowlistError::storage)?;
        Ok(matches!(
            entry,
            Some(entry) if entry.allowed && entry.implementation == implementation
        ))
    }

    async fn emit(&self, event: AllowlistEvent) -> Result<(), AllowlistError> {
        self.store
            .record_event(&event)
            .await
            .map_err(AllowlistError::storage)?;
        self.events.publish(event);
        Ok(())
    }
}

/// Flat set of individually approved operator addresses, e.g. marketplace
/// contracts. Batch operations are idempotent: re-adding an allowed address
/// and removing a non-member are both tolerated silently.
#[derive(Clone)]
pub struct AddressRegistry {
    store: AllowlistStore,
    authorizer: Arc<dyn Authorizer>,
    events: EventBus,
    write_lock: Arc<Mutex<()>>,
}

impl AddressRegistry {
    pub fn new(store: AllowlistStore, authorizer: Arc<dyn Authorizer>, events: EventBus) -> Self {
        Self {
            store,
            authorizer,
            events,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn add_addresses(
        &self,
        principal: Address,
        addresses: Vec<Address>,
    ) -> Result<(), AllowlistError> {
        require(self.authorizer.as_ref(), principal, Capability::Registrar).await?;
        if addresses.iter().any(|address| *address == Address::ZERO) {
            return Err(AllowlistError::InvalidAddress);
        }

        let _guard = self.write_lock.lock().await;
        for address in addresses {
            let already_allowed = matches!(
                self.store
                    .address_entry(address)
                    .await
                    .map_err(AllowlistError::storage)?,
                Some(entry) if entry.allowed
            );
            if already_allowed {
                continue;
            }

            self.store
                .put_address_entry(&AddressEntry {
                    address,
                    allowed: true,
                })
                .await
                .map_err(AllowlistError::storage)?;
            self.emit(AllowlistEvent::address(address, true)).await?;
        }
        Ok(())
    }

    pub async fn remove_addresses(
        &self,
        principal: Address,
        addresses: Vec<Address>,
    ) -> Result<(), AllowlistError> {
        require(self.authorizer.as_ref(), principal, Capability::Registrar).await?;

        let _guard = self.write_lock.lock().await;
        for address in addresses {
            let currently_allowed = matches!(
                self.store
                    .address_entry(address)
                    .await
                    .map_err(AllowlistError::storage)?,
                Some(entry) if entry.allowed
            );
            if !currently_allowed {
                continue;
            }

            self.store
                .put_address_entry(&AddressEntry {
                    address,
                    allowed: false,
                })
                .await
                .map_err(AllowlistError::storage)?;
            self.emit(AllowlistEvent::address(address, false)).await?;
        }
        Ok(())
    }

    pub async fn is_allowed(&self, address: Address) -> Result<bool, AllowlistError> {
        let entry = self
            .store
            .address_entry(address)
            .await
            .map_err(AllowlistError::storage)?;
        Ok(matches!(entry, Some(entry) if entry.allowed))
    }

    async fn emit(&self, event: AllowlistEvent) -> Result<(), AllowlistError> {
        self.store
            .record_event(&event)
            .await
            .map_err(AllowlistError::storage)?;
        self.events.publish(event);
        Ok(())
    }
}
