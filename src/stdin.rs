use std::str::FromStr;

use alloy::primitives::Address;
use tokio::io::AsyncBufReadExt;
use tokio::{io, select};

use crate::controller::ControllerInterface;

/// Blocking loop forever to watch stdin for operator commands.
/// Mutations act as the configured admin principal.
pub async fn watch_stdin(ctl: ControllerInterface, admin: Option<Address>) {
    let mut stdin = io::BufReader::new(io::stdin()).lines();

    loop {
        select! {
            Ok(Some(line)) = stdin.next_line() => {
               process_stdin_line(ctl.clone(), admin, line).await;
            }
        }
    }
}

async fn process_stdin_line(ctl: ControllerInterface, admin: Option<Address>, line: String) {
    if line.is_empty() {
        return;
    }

    if let Some(raw) = line.strip_prefix("/check ") {
        match Address::from_str(raw.trim()) {
            Ok(address) => match ctl.check(address).await {
                Ok(decision) => {
                    tracing::info!(
                        address = address.to_checksum(None),
                        allowed = decision.allowed,
                        path = decision.path.to_string(),
                        "Checked address"
                    );
                }
                Err(err) => {
                    tracing::error!(error = err.to_string(), "Error checking address");
                }
            },
            Err(e) => {
                tracing::warn!("Error parsing address: {:?}", e);
            }
        }
        return;
    }

    let admin = match admin {
        Some(admin) => admin,
        None => {
            tracing::warn!("No admin principal configured, ignoring mutation command");
            return;
        }
    };

    if let Some(raw) = line.strip_prefix("/add-address ") {
        match parse_addresses(raw) {
            Ok(addresses) => {
                if let Err(err) = ctl.add_addresses(admin, addresses).await {
                    tracing::error!(error = err.to_string(), "Error adding addresses");
                }
            }
            Err(e) => tracing::warn!("Error parsing addresses: {:?}", e),
        }
    } else if let Some(raw) = line.strip_prefix("/remove-address ") {
        match parse_addresses(raw) {
            Ok(addresses) => {
                if let Err(err) = ctl.remove_addresses(admin, addresses).await {
                    tracing::error!(error = err.to_string(), "Error removing addresses");
                }
            }
            Err(e) => tracing::warn!("Error parsing addresses: {:?}", e),
        }
    } else if let Some(raw) = line.strip_prefix("/add-wallet ") {
        match Address::from_str(raw.trim()) {
            Ok(wallet) => match ctl.add_wallet(admin, wallet).await {
                Ok(code_hash) => {
                    tracing::info!(code_hash = code_hash.to_string(), "Wallet added");
                }
                Err(err) => {
                    tracing::error!(error = err.to_string(), "Error adding wallet");
                }
            },
            Err(e) => tracing::warn!("Error parsing wallet address: {:?}", e),
        }
    } else if let Some(raw) = line.strip_prefix("/remove-wallet ") {
        match Address::from_str(raw.trim()) {
            Ok(wallet) => match ctl.remove_wallet(admin, wallet).await {
                Ok(code_hash) => {
                    tracing::info!(code_hash = code_hash.to_string(), "Wallet removed");
                }
                Err(err) => {
                    tracing::error!(error = err.to_string(), "Error removing wallet");
                }
            },
            Err(e) => tracing::warn!("Error parsing wallet address: {:?}", e),
        }
    } else if let Some(raw) = line.strip_prefix("/grant ") {
        match Address::from_str(raw.trim()) {
            Ok(principal) => {
                if let Err(err) = ctl.grant_registrar(admin, principal).await {
                    tracing::error!(error = err.to_string(), "Error granting registrar");
                }
            }
            Err(e) => tracing::warn!("Error parsing principal: {:?}", e),
        }
    } else if let Some(raw) = line.strip_prefix("/revoke ") {
        match Address::from_str(raw.trim()) {
            Ok(principal) => {
                if let Err(err) = ctl.revoke_registrar(admin, principal).await {
                    tracing::error!(error = err.to_string(), "Error revoking registrar");
                }
            }
            Err(e) => tracing::warn!("Error parsing principal: {:?}", e),
        }
    } else {
        tracing::warn!("Unknown command: {}", line);
    }
}

fn parse_addresses(raw: &str) -> eyre::Result<Vec<Address>> {
    raw.split(',')
        .map(|s| Address::from_str(s.trim()).map_err(|e| eyre::eyre!("{}: {}", s, e)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_addresses() {
        let addresses =
            parse_addresses("0x0000000000000000000000000000000000000001, 0x0000000000000000000000000000000000000002")
                .unwrap();
        assert_eq!(addresses.len(), 2);

        assert!(parse_addresses("not-an-address").is_err());
    }
}
