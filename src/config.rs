use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use alloy::primitives::{b256, Address, B256};
use envconfig::Envconfig;
use once_cell::sync::Lazy;

/// EIP-1967 implementation slot, the default place proxy wallets keep their
/// implementation pointer.
pub const EIP1967_IMPLEMENTATION_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

static DEFAULT_RPC_URLS: Lazy<HashMap<u64, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (13371, "https://rpc.immutable.com"),
        (13473, "https://rpc.testnet.immutable.com"),
    ])
});

#[derive(Envconfig, Debug)]
pub struct Config {
    #[envconfig(from = "API_PORT", default = "7790")]
    pub api_port: u64,

    #[envconfig(from = "CONNECT_EXTERNAL", default = "true")]
    pub connect_external: bool,

    #[envconfig(from = "DATABASE_URL")]
    pub db_url: Option<String>,

    #[envconfig(from = "PERSIST_STATE", default = "false")]
    pub persist_state: bool,

    #[envconfig(from = "CHAIN_ID", default = "13371")]
    pub chain_id: u64,

    // Dynamic configuration: RPC urls take the form of CHAIN_<chain_id>_RPC_HTTP
    // If not provided in the environment, the default is to use the public node
    #[envconfig(from = "CHAIN_MODE", default = "rpc")]
    pub chain_mode: ChainMode,

    #[envconfig(
        from = "IMPLEMENTATION_SLOT",
        default = "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc"
    )]
    pub implementation_slot: B256,

    // Principal seeded with the admin capability at startup
    #[envconfig(from = "ADMIN_ADDRESS")]
    pub admin_address: Option<Address>,

    #[envconfig(from = "ADMIN_API_SECRET")]
    pub admin_api_secret: Option<String>,

    // node_id will only be used for logging purposes, if set
    #[envconfig(from = "NODE_ID")]
    pub node_id: Option<u64>,

    #[envconfig(from = "INTERACTIVE", default = "false")]
    pub interactive: bool,
}

impl Config {
    pub fn test_default() -> Self {
        Config {
            api_port: 0,
            connect_external: false,
            db_url: None,
            persist_state: false,
            chain_id: 13371,
            chain_mode: ChainMode::Memory,
            implementation_slot: EIP1967_IMPLEMENTATION_SLOT,
            admin_address: Some(Address::repeat_byte(0xad)),
            admin_api_secret: Some("test-secret".to_string()),
            node_id: None,
            interactive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChainMode {
    Rpc,    // classify against a live node over RPC
    Memory, // classify against an in-memory fixture, for local runs and tests
}

impl FromStr for ChainMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rpc" => Ok(Self::Rpc),
            "memory" => Ok(Self::Memory),
            _ => Err(eyre::eyre!("Invalid chain mode")),
        }
    }
}

impl Config {
    pub fn initial_network_ip(&self) -> String {
        if self.connect_external {
            "0.0.0.0".to_string()
        } else {
            "127.0.0.1".to_string()
        }
    }

    pub fn rpc_url(&self) -> eyre::Result<String> {
        match env::var(format!("CHAIN_{}_RPC_HTTP", self.chain_id)) {
            Ok(url) => Ok(url),
            Err(_) => match DEFAULT_RPC_URLS.get(&self.chain_id) {
                Some(url) => Ok(url.to_string()),
                None => Err(eyre::eyre!(
                    "No default RPC URL for chain {}",
                    self.chain_id
                )),
            },
        }
    }

    pub fn validate(self) -> Self {
        if self.chain_mode == ChainMode::Rpc {
            self.rpc_url().expect(
                format!(
                    "No RPC URL for chain {}. Set environment variable CHAIN_{}_RPC_HTTP",
                    self.chain_id, self.chain_id
                )
                .as_str(),
            );
        }
        self
    }
}

pub fn init() -> Config {
    Config::init_from_env()
        .expect("Failed to load config")
        .validate()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rpc_url_defaults() {
        let config = Config::test_default();
        assert_eq!(config.rpc_url().unwrap(), "https://rpc.immutable.com");

        let mut config = Config::test_default();
        config.chain_id = 13473;
        assert_eq!(
            config.rpc_url().unwrap(),
            "https://rpc.testnet.immutable.com"
        );

        let mut config = Config::test_default();
        config.chain_id = 1;
        assert!(config.rpc_url().is_err());
    }

    #[test]
    fn test_implementation_slot_default() {
        let config = Config::test_default();
        assert_eq!(config.implementation_slot, EIP1967_IMPLEMENTATION_SLOT);
    }
}
