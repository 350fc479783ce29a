use alloy::primitives::{Address, B256};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::auth::CapabilityStore;
use crate::engine::AllowlistEngine;
use crate::events::EventBus;
use crate::registry::AddressRegistry;
use crate::storage::AllowlistStore;
use crate::types::{AllowlistError, AllowlistEvent, Decision, NodeInfo};

pub enum DBQuery {
    Direct(oneshot::Sender<eyre::Result<SqlitePool>>),
}

pub enum ControllerCommands {
    Check {
        address: Address,
        snd: oneshot::Sender<Result<Decision, AllowlistError>>,
    },
    AddAddresses {
        principal: Address,
        addresses: Vec<Address>,
        snd: oneshot::Sender<Result<(), AllowlistError>>,
    },
    RemoveAddresses {
        principal: Address,
        addresses: Vec<Address>,
        snd: oneshot::Sender<Result<(), AllowlistError>>,
    },
    AddBytecodeEntry {
        principal: Address,
        code_hash: B256,
        implementation: Address,
        snd: oneshot::Sender<Result<(), AllowlistError>>,
    },
    RemoveBytecodeEntry {
        principal: Address,
        code_hash: B256,
        snd: oneshot::Sender<Result<(), AllowlistError>>,
    },
    AddWallet {
        principal: Address,
        wallet: Address,
        snd: oneshot::Sender<Result<B256, AllowlistError>>,
    },
    RemoveWallet {
        principal: Address,
        wallet: Address,
        snd: oneshot::Sender<Result<B256, AllowlistError>>,
    },
    GrantRegistrar {
        admin: Address,
        principal: Address,
        snd: oneshot::Sender<Result<(), AllowlistError>>,
    },
    RevokeRegistrar {
        admin: Address,
        principal: Address,
        snd: oneshot::Sender<Result<(), AllowlistError>>,
    },
    SubscribeEvents {
        snd: oneshot::Sender<broadcast::Receiver<AllowlistEvent>>,
    },
    ReturnNodeInfo {
        snd: oneshot::Sender<NodeInfo>,
    },
    Query(DBQuery),
}

/// Owns the engine and serializes every mutation through one loop, which is
/// what keeps concurrent registrar calls from racing on the same key.
pub struct Controller {
    external_commands: mpsc::Receiver<ControllerCommands>,
    engine: AllowlistEngine,
    addresses: AddressRegistry,
    capabilities: CapabilityStore,
    store: AllowlistStore,
    events: EventBus,
    node_info: NodeInfo,
}

impl Controller {
    pub fn new(
        external_commands: mpsc::Receiver<ControllerCommands>,
        engine: AllowlistEngine,
        addresses: AddressRegistry,
        capabilities: CapabilityStore,
        store: AllowlistStore,
        events: EventBus,
        node_info: NodeInfo,
    ) -> Self {
        Self {
            external_commands,
            engine,
            addresses,
            capabilities,
            store,
            events,
            node_info,
        }
    }

    pub async fn run_loop(mut self) {
        while let Some(command) = self.external_commands.recv().await {
            if let Err(err) = self.handle_command(command).await {
                tracing::error!(error = err.to_string(), "Error handling command");
            }
        }
    }

    async fn handle_command(&mut self, command: ControllerCommands) -> eyre::Result<()> {
        match command {
            ControllerCommands::Check { address, snd } => {
                let result = self.engine.evaluate(address).await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending check response back to caller"))?;
            }
            ControllerCommands::AddAddresses {
                principal,
                addresses,
                snd,
            } => {
                let result = self.addresses.add_addresses(principal, addresses).await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::RemoveAddresses {
                principal,
                addresses,
                snd,
            } => {
                let result = self.addresses.remove_addresses(principal, addresses).await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::AddBytecodeEntry {
                principal,
                code_hash,
                implementation,
                snd,
            } => {
                let result = self
                    .engine
                    .bytecode()
                    .add_entry(principal, code_hash, implementation)
                    .await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::RemoveBytecodeEntry {
                principal,
                code_hash,
                snd,
            } => {
                let result = self
                    .engine
                    .bytecode()
                    .remove_entry(principal, code_hash)
                    .await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::AddWallet {
                principal,
                wallet,
                snd,
            } => {
                let result = self.engine.add_wallet(principal, wallet).await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::RemoveWallet {
                principal,
                wallet,
                snd,
            } => {
                let result = self.engine.remove_wallet(principal, wallet).await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::GrantRegistrar {
                admin,
                principal,
                snd,
            } => {
                let result = self.capabilities.grant_registrar(admin, principal).await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::RevokeRegistrar {
                admin,
                principal,
                snd,
            } => {
                let result = self.capabilities.revoke_registrar(admin, principal).await;
                snd.send(result)
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::SubscribeEvents { snd } => {
                snd.send(self.events.subscribe())
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::ReturnNodeInfo { snd } => {
                snd.send(self.node_info.clone())
                    .map_err(|_| eyre::eyre!("Error sending response back to caller"))?;
            }
            ControllerCommands::Query(DBQuery::Direct(snd)) => {
                snd.send(Ok(self.store.db()))
                    .map_err(|_| eyre::eyre!("Error sending db back to caller"))?;
            }
        }
        Ok(())
    }
}

/// Cheap clonable handle for talking to the controller from the API, stdin
/// loop, and tests.
#[derive(Clone)]
pub struct ControllerInterface {
    command_sender: mpsc::Sender<ControllerCommands>,
}

impl ControllerInterface {
    pub fn new(command_sender: mpsc::Sender<ControllerCommands>) -> Self {
        Self { command_sender }
    }

    pub async fn send_command(&self, command: ControllerCommands) -> eyre::Result<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|err| eyre::eyre!("Error sending command to controller: {:?}", err))
    }

    pub async fn check(&self, address: Address) -> eyre::Result<Decision> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::Check { address, snd })
            .await?;
        Ok(recv.await??)
    }

    pub async fn add_addresses(
        &self,
        principal: Address,
        addresses: Vec<Address>,
    ) -> eyre::Result<()> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::AddAddresses {
            principal,
            addresses,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn remove_addresses(
        &self,
        principal: Address,
        addresses: Vec<Address>,
    ) -> eyre::Result<()> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::RemoveAddresses {
            principal,
            addresses,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn add_bytecode_entry(
        &self,
        principal: Address,
        code_hash: B256,
        implementation: Address,
    ) -> eyre::Result<()> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::AddBytecodeEntry {
            principal,
            code_hash,
            implementation,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn remove_bytecode_entry(
        &self,
        principal: Address,
        code_hash: B256,
    ) -> eyre::Result<()> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::RemoveBytecodeEntry {
            principal,
            code_hash,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn add_wallet(&self, principal: Address, wallet: Address) -> eyre::Result<B256> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::AddWallet {
            principal,
            wallet,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn remove_wallet(&self, principal: Address, wallet: Address) -> eyre::Result<B256> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::RemoveWallet {
            principal,
            wallet,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn grant_registrar(&self, admin: Address, principal: Address) -> eyre::Result<()> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::GrantRegistrar {
            admin,
            principal,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn revoke_registrar(&self, admin: Address, principal: Address) -> eyre::Result<()> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::RevokeRegistrar {
            admin,
            principal,
            snd,
        })
        .await?;
        Ok(recv.await??)
    }

    pub async fn subscribe_events(&self) -> eyre::Result<broadcast::Receiver<AllowlistEvent>> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::SubscribeEvents { snd })
            .await?;
        Ok(recv.await?)
    }

    pub async fn node_info(&self) -> eyre::Result<NodeInfo> {
        let (snd, recv) = oneshot::channel();
        self.send_command(ControllerCommands::ReturnNodeInfo { snd })
            .await?;
        Ok(recv.await?)
    }
}
