use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::auth::{Authorizer, CapabilityStore};
use crate::chain::{self, ChainStateReader, MemoryChainState};
use crate::config::{ChainMode, Config};
use crate::controller::{Controller, ControllerInterface};
use crate::engine::AllowlistEngine;
use crate::events::EventBus;
use crate::registry::{AddressRegistry, BytecodeRegistry};
use crate::storage::AllowlistStore;
use crate::types::NodeInfo;

/// Starts the controller over a fresh engine wired to the configured chain
/// backend. All interaction happens through the returned
/// `ControllerInterface`; the controller loop serializes every mutation.
pub async fn start_services(config: &Config) -> eyre::Result<ControllerInterface> {
    let chain: Arc<dyn ChainStateReader> = match config.chain_mode {
        ChainMode::Rpc => Arc::new(chain::connect(&config.rpc_url()?).await?),
        ChainMode::Memory => {
            tracing::warn!(
                "Using in-memory chain state; every address classifies as an EOA until code is set"
            );
            Arc::new(MemoryChainState::new())
        }
    };

    start_services_with_chain(config, chain).await
}

/// Injection point for tests and embedders that bring their own chain state.
pub async fn start_services_with_chain(
    config: &Config,
    chain: Arc<dyn ChainStateReader>,
) -> eyre::Result<ControllerInterface> {
    let store = AllowlistStore::new(config).await;

    let capabilities = CapabilityStore::new(store.clone());
    if let Some(admin) = config.admin_address {
        capabilities.seed_admin(admin).await?;
    } else {
        tracing::warn!("No ADMIN_ADDRESS configured; registrar capabilities cannot be granted");
    }

    let events = EventBus::default();
    let authorizer: Arc<dyn Authorizer> = Arc::new(capabilities.clone());
    let bytecode = BytecodeRegistry::new(store.clone(), authorizer.clone(), events.clone());
    let addresses = AddressRegistry::new(store.clone(), authorizer, events.clone());
    let engine = AllowlistEngine::new(
        chain,
        bytecode,
        addresses.clone(),
        config.implementation_slot,
    );

    let node_info = NodeInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        chain_id: config.chain_id,
        chain_mode: format!("{:?}", config.chain_mode).to_lowercase(),
        persist_state: config.persist_state,
    };

    let (ext_cmd_send, ext_cmd_recv) = tokio::sync::mpsc::channel(1024);

    let controller = Controller::new(
        ext_cmd_recv,
        engine,
        addresses,
        capabilities,
        store,
        events,
        node_info,
    );
    let controller_interface = ControllerInterface::new(ext_cmd_send);

    tracing::info!(
        chain_id = config.chain_id,
        "Starting allowgate controller"
    );

    let node_id = config.node_id;
    tokio::spawn(async move {
        let future = controller.run_loop();

        match node_id {
            Some(node_id) => future.instrument(info_span!("", "node_id" = node_id)).await,
            None => future.await,
        }
    });

    Ok(controller_interface)
}
