use alloy::primitives::Address;
use async_trait::async_trait;

use crate::storage::{AllowlistStore, Reader, Writer};
use crate::types::{AllowlistError, Capability};

/// Capability check seam. The registries only depend on this trait, so an
/// alternative policy engine can stand in for the store-backed one.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn has_capability(
        &self,
        principal: Address,
        capability: Capability,
    ) -> eyre::Result<bool>;
}

pub async fn require(
    authorizer: &dyn Authorizer,
    principal: Address,
    capability: Capability,
) -> Result<(), AllowlistError> {
    let held = authorizer
        .has_capability(principal, capability)
        .await
        .map_err(AllowlistError::storage)?;

    if held {
        Ok(())
    } else {
        Err(AllowlistError::Unauthorized {
            principal,
            required: capability,
        })
    }
}

/// Store-backed capability set. Registrar membership is a set, not a single
/// owner; granting and revoking requires the admin capability.
#[derive(Clone)]
pub struct CapabilityStore {
    store: AllowlistStore,
}

impl CapabilityStore {
    pub fn new(store: AllowlistStore) -> Self {
        Self { store }
    }

    /// Seeds the configured admin principal. Safe to call on every boot.
    pub async fn seed_admin(&self, admin: Address) -> eyre::Result<()> {
        tracing::info!(admin = admin.to_checksum(None), "Seeding admin principal");
        self.store.put_capability(admin, Capability::Admin).await
    }

    pub async fn grant_registrar(
        &self,
        admin: Address,
        principal: Address,
    ) -> Result<(), AllowlistError> {
        require(self, admin, Capability::Admin).await?;
        if principal == Address::ZERO {
            return Err(AllowlistError::InvalidAddress);
        }
        self.store
            .put_capability(principal, Capability::Registrar)
            .await
            .map_err(AllowlistError::storage)?;
        tracing::info!(
            principal = principal.to_checksum(None),
            "Granted registrar capability"
        );
        Ok(())
    }

    pub async fn revoke_registrar(
        &self,
        admin: Address,
        principal: Address,
    ) -> Result<(), AllowlistError> {
        require(self, admin, Capability::Admin).await?;
        self.store
            .delete_capability(principal, Capability::Registrar)
            .await
            .map_err(AllowlistError::storage)?;
        tracing::info!(
            principal = principal.to_checksum(None),
            "Revoked registrar capability"
        );
        Ok(())
    }
}

#[async_trait]
impl Authorizer for CapabilityStore {
    async fn has_capability(
        &self,
        principal: Address,
        capability: Capability,
    ) -> eyre::Result<bool> {
        self.store.has_capability(principal, capability).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;

    async fn make_capabilities() -> (CapabilityStore, Address) {
        let config = Config::test_default();
        let store = AllowlistStore::new(&config).await;
        let capabilities = CapabilityStore::new(store);
        let admin = config.admin_address.unwrap();
        capabilities.seed_admin(admin).await.unwrap();
        (capabilities, admin)
    }

    #[tokio::test]
    async fn test_grant_and_revoke_registrar() {
        let (capabilities, admin) = make_capabilities().await;
        let registrar = Address::repeat_byte(0x01);

        capabilities
            .grant_registrar(admin, registrar)
            .await
            .unwrap();
        assert!(capabilities
            .has_capability(registrar, Capability::Registrar)
            .await
            .unwrap());

        capabilities
            .revoke_registrar(admin, registrar)
            .await
            .unwrap();
        assert!(!capabilities
            .has_capability(registrar, Capability::Registrar)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_grant_requires_admin() {
        let (capabilities, _admin) = make_capabilities().await;
        let rando = Address::repeat_byte(0x02);

        let err = capabilities
            .grant_registrar(rando, Address::repeat_byte(0x03))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllowlistError::Unauthorized {
                principal,
                required: Capability::Admin,
            } if principal == rando
        ));
    }

    #[tokio::test]
    async fn test_grant_rejects_zero_address() {
        let (capabilities, admin) = make_capabilities().await;

        let err = capabilities
            .grant_registrar(admin, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, AllowlistError::InvalidAddress));
    }

    #[tokio::test]
    async fn test_require_denies_without_capability() {
        let (capabilities, admin) = make_capabilities().await;

        // the admin does not implicitly hold the registrar capability
        let err = require(&capabilities, admin, Capability::Registrar)
            .await
            .unwrap_err();
        assert!(matches!(err, AllowlistError::Unauthorized { .. }));
    }
}
