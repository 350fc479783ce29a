use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an address currently is, based on live chain state. An undeployed
/// counterfactual wallet has no code yet, so it classifies as `Eoa` until the
/// deployment lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Eoa,
    Contract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Admin,
    Registrar,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Admin => "admin",
            Capability::Registrar => "registrar",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "registrar" => Ok(Self::Registrar),
            _ => Err(eyre::eyre!("Invalid capability: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Bytecode,
    Address,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Bytecode => "bytecode",
            EntryKind::Address => "address",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bytecode" => Ok(Self::Bytecode),
            "address" => Ok(Self::Address),
            _ => Err(eyre::eyre!("Invalid entry kind: {}", s)),
        }
    }
}

/// Bytecode-form allowlist entry. A codehash is bound to exactly one approved
/// implementation address, so two wallets with identical deployed bytecode but
/// different implementation pointers are never both approved by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytecodeEntry {
    pub code_hash: B256,
    pub implementation: Address,
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressEntry {
    pub address: Address,
    pub allowed: bool,
}

/// Flattened view of either entry form, used by the listing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub kind: EntryKind,
    pub key: String,
    pub implementation: Option<Address>,
    pub allowed: bool,
}

/// Audit record emitted on every registry mutation, persisted and published
/// for external indexers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowlistEvent {
    pub kind: EntryKind,
    pub key: String,
    pub implementation: Option<Address>,
    pub new_state: bool,
    pub at: DateTime<Utc>,
}

impl AllowlistEvent {
    pub fn bytecode(code_hash: B256, implementation: Address, new_state: bool) -> Self {
        Self {
            kind: EntryKind::Bytecode,
            key: code_hash.to_string(),
            implementation: Some(implementation),
            new_state,
            at: Utc::now(),
        }
    }

    pub fn address(address: Address, new_state: bool) -> Self {
        Self {
            kind: EntryKind::Address,
            key: address.to_checksum(None),
            implementation: None,
            new_state,
            at: Utc::now(),
        }
    }
}

/// Which branch of the decision algorithm produced the verdict. Denials name
/// the path so integrators can debug a rejection without seeing store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecisionPath {
    ZeroAddress,
    Eoa,
    BytecodeMatch,
    AddressMatch,
    DefaultDeny,
}

impl fmt::Display for DecisionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionPath::ZeroAddress => "zero address",
            DecisionPath::Eoa => "EOA short-circuit",
            DecisionPath::BytecodeMatch => "bytecode registry match",
            DecisionPath::AddressMatch => "address registry match",
            DecisionPath::DefaultDeny => "no registry match",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub path: DecisionPath,
}

impl Decision {
    pub fn allow(path: DecisionPath) -> Self {
        Self {
            allowed: true,
            path,
        }
    }

    pub fn deny(path: DecisionPath) -> Self {
        Self {
            allowed: false,
            path,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub version: String,
    pub chain_id: u64,
    pub chain_mode: String,
    pub persist_state: bool,
}

/// Typed failure taxonomy for every registry and engine operation. The engine
/// never maps one of these to an "allow" result; guarded operations treat any
/// error as a denial.
#[derive(Debug, thiserror::Error)]
pub enum AllowlistError {
    #[error("the zero address is never allowlistable")]
    InvalidAddress,

    #[error("{principal} is missing required capability '{required}'")]
    Unauthorized {
        principal: Address,
        required: Capability,
    },

    #[error("bytecode entry for {0} is already registered")]
    AlreadyRegistered(B256),

    #[error("no active bytecode entry for {0}")]
    NotRegistered(B256),

    #[error("chain state query failed: {0}")]
    ClassifierUnavailable(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl AllowlistError {
    pub fn storage(err: impl fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}
