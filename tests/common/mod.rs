pub mod factories;

pub mod allowgate_build {
    use std::sync::Arc;

    use alloy::primitives::Address;
    use allowgate::auth::{Authorizer, CapabilityStore};
    use allowgate::chain::MemoryChainState;
    use allowgate::config::Config;
    use allowgate::controller::ControllerInterface;
    use allowgate::engine::AllowlistEngine;
    use allowgate::events::EventBus;
    use allowgate::registry::{AddressRegistry, BytecodeRegistry};
    use allowgate::storage::AllowlistStore;
    use rand::Rng;

    pub fn make_config() -> Config {
        let mut config = Config::test_default();
        config.admin_api_secret = Some(format!("0x{}", rand::thread_rng().gen_range(10..99)));

        config
    }

    pub struct TestEngine {
        pub engine: AllowlistEngine,
        pub chain: MemoryChainState,
        pub capabilities: CapabilityStore,
        pub events: EventBus,
        pub store: AllowlistStore,
        pub admin: Address,
        pub registrar: Address,
    }

    /// Builds the full engine stack over in-memory chain state, with a
    /// registrar already granted and ready to use.
    pub async fn make_engine(config: &Config) -> TestEngine {
        let chain = MemoryChainState::new();
        let store = AllowlistStore::new(config).await;

        let capabilities = CapabilityStore::new(store.clone());
        let admin = config.admin_address.expect("test config must set an admin");
        capabilities.seed_admin(admin).await.unwrap();
        let registrar = Address::repeat_byte(0x77);
        capabilities
            .grant_registrar(admin, registrar)
            .await
            .unwrap();

        let events = EventBus::default();
        let authorizer: Arc<dyn Authorizer> = Arc::new(capabilities.clone());
        let bytecode = BytecodeRegistry::new(store.clone(), authorizer.clone(), events.clone());
        let addresses = AddressRegistry::new(store.clone(), authorizer, events.clone());
        let engine = AllowlistEngine::new(
            Arc::new(chain.clone()),
            bytecode,
            addresses,
            config.implementation_slot,
        );

        TestEngine {
            engine,
            chain,
            capabilities,
            events,
            store,
            admin,
            registrar,
        }
    }

    /// Starts a full controller node over in-memory chain state. The returned
    /// chain handle is shared with the node, so tests can deploy code
    /// mid-flight.
    pub async fn make_node(config: &Config) -> (ControllerInterface, MemoryChainState) {
        let chain = MemoryChainState::new();
        let ctl = allowgate::run::start_services_with_chain(config, Arc::new(chain.clone()))
            .await
            .unwrap();
        (ctl, chain)
    }
}
