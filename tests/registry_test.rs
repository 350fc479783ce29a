mod common;

use alloy::primitives::{Address, B256};
use allowgate::storage;
use allowgate::storage::QueryOptions;
use allowgate::types::{AllowlistError, EntryKind};

use crate::common::allowgate_build::{make_config, make_engine};

#[test_log::test(tokio::test)]
async fn test_bytecode_add_remove_round_trip() {
    let config = make_config();
    let node = make_engine(&config).await;
    let bytecode = node.engine.bytecode();

    let code_hash = B256::repeat_byte(0x11);
    let implementation = Address::repeat_byte(0x22);

    bytecode
        .add_entry(node.registrar, code_hash, implementation)
        .await
        .unwrap();
    assert!(bytecode
        .is_allowed(code_hash, implementation)
        .await
        .unwrap());

    bytecode
        .remove_entry(node.registrar, code_hash)
        .await
        .unwrap();
    assert!(!bytecode
        .is_allowed(code_hash, implementation)
        .await
        .unwrap());

    // re-adding after removal restores the original state
    bytecode
        .add_entry(node.registrar, code_hash, implementation)
        .await
        .unwrap();
    assert!(bytecode
        .is_allowed(code_hash, implementation)
        .await
        .unwrap());
}

#[test_log::test(tokio::test)]
async fn test_bytecode_double_add_fails_fast() {
    let config = make_config();
    let node = make_engine(&config).await;
    let bytecode = node.engine.bytecode();

    let code_hash = B256::repeat_byte(0x33);
    let implementation = Address::repeat_byte(0x44);

    bytecode
        .add_entry(node.registrar, code_hash, implementation)
        .await
        .unwrap();

    let err = bytecode
        .add_entry(node.registrar, code_hash, implementation)
        .await
        .unwrap_err();
    assert!(matches!(err, AllowlistError::AlreadyRegistered(hash) if hash == code_hash));
}

#[test_log::test(tokio::test)]
async fn test_bytecode_remove_absent_fails_fast() {
    let config = make_config();
    let node = make_engine(&config).await;
    let bytecode = node.engine.bytecode();

    let code_hash = B256::repeat_byte(0x55);

    let err = bytecode
        .remove_entry(node.registrar, code_hash)
        .await
        .unwrap_err();
    assert!(matches!(err, AllowlistError::NotRegistered(hash) if hash == code_hash));

    // removing twice is also an error: the second remove sees a disabled entry
    bytecode
        .add_entry(node.registrar, code_hash, Address::repeat_byte(0x66))
        .await
        .unwrap();
    bytecode
        .remove_entry(node.registrar, code_hash)
        .await
        .unwrap();
    let err = bytecode
        .remove_entry(node.registrar, code_hash)
        .await
        .unwrap_err();
    assert!(matches!(err, AllowlistError::NotRegistered(_)));
}

#[test_log::test(tokio::test)]
async fn test_bytecode_binds_implementation() {
    let config = make_config();
    let node = make_engine(&config).await;
    let bytecode = node.engine.bytecode();

    let code_hash = B256::repeat_byte(0x77);
    let implementation = Address::repeat_byte(0x88);
    let other_implementation = Address::repeat_byte(0x99);

    bytecode
        .add_entry(node.registrar, code_hash, implementation)
        .await
        .unwrap();

    assert!(bytecode
        .is_allowed(code_hash, implementation)
        .await
        .unwrap());
    assert!(!bytecode
        .is_allowed(code_hash, other_implementation)
        .await
        .unwrap());
}

#[test_log::test(tokio::test)]
async fn test_bytecode_rejects_zero_implementation() {
    let config = make_config();
    let node = make_engine(&config).await;

    let err = node
        .engine
        .bytecode()
        .add_entry(node.registrar, B256::repeat_byte(0xaa), Address::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, AllowlistError::InvalidAddress));
}

#[test_log::test(tokio::test)]
async fn test_address_batch_is_idempotent() {
    let config = make_config();
    let node = make_engine(&config).await;
    let addresses = node.engine.addresses();

    let market = Address::repeat_byte(0xbb);

    addresses
        .add_addresses(node.registrar, vec![market])
        .await
        .unwrap();
    // second add is a no-op, not an error
    addresses
        .add_addresses(node.registrar, vec![market])
        .await
        .unwrap();
    assert!(addresses.is_allowed(market).await.unwrap());

    // removing a non-member is tolerated
    addresses
        .remove_addresses(node.registrar, vec![Address::repeat_byte(0xcc)])
        .await
        .unwrap();

    addresses
        .remove_addresses(node.registrar, vec![market])
        .await
        .unwrap();
    assert!(!addresses.is_allowed(market).await.unwrap());

    // only the original add and remove hit the audit log
    let events = storage::list_events(&node.store.db(), &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_address_batch_rejects_zero() {
    let config = make_config();
    let node = make_engine(&config).await;

    let err = node
        .engine
        .addresses()
        .add_addresses(
            node.registrar,
            vec![Address::repeat_byte(0xdd), Address::ZERO],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AllowlistError::InvalidAddress));

    // the whole batch is rejected, including the valid address
    assert!(!node
        .engine
        .addresses()
        .is_allowed(Address::repeat_byte(0xdd))
        .await
        .unwrap());
}

#[test_log::test(tokio::test)]
async fn test_mutations_require_registrar_capability() {
    let config = make_config();
    let node = make_engine(&config).await;

    let rando = Address::repeat_byte(0xee);

    let err = node
        .engine
        .addresses()
        .add_addresses(rando, vec![Address::repeat_byte(0x01)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AllowlistError::Unauthorized { principal, .. } if principal == rando
    ));

    // the admin capability does not imply registrar
    let err = node
        .engine
        .bytecode()
        .add_entry(node.admin, B256::repeat_byte(0x02), Address::repeat_byte(0x03))
        .await
        .unwrap_err();
    assert!(matches!(err, AllowlistError::Unauthorized { .. }));
}

#[test_log::test(tokio::test)]
async fn test_mutations_publish_events() {
    let config = make_config();
    let node = make_engine(&config).await;
    let mut receiver = node.events.subscribe();

    let code_hash = B256::repeat_byte(0x0f);
    let implementation = Address::repeat_byte(0x10);
    node.engine
        .bytecode()
        .add_entry(node.registrar, code_hash, implementation)
        .await
        .unwrap();

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.kind, EntryKind::Bytecode);
    assert_eq!(event.key, code_hash.to_string());
    assert_eq!(event.implementation, Some(implementation));
    assert!(event.new_state);

    // and the same record lands in the persistent audit log
    let events = storage::list_events(
        &node.store.db(),
        &QueryOptions {
            kind: Some(EntryKind::Bytecode),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, code_hash.to_string());
}
