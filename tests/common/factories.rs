use alloy::primitives::{keccak256, Address, Bytes, B256};
use allowgate::chain::MemoryChainState;
use allowgate::config::EIP1967_IMPLEMENTATION_SLOT;

// EIP-1167 minimal proxy runtime code, split around the embedded
// implementation address
const PROXY_PREFIX: [u8; 10] = [0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73];
const PROXY_SUFFIX: [u8; 15] = [
    0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
];

/// Runtime bytecode of an EIP-1167 minimal proxy delegating to
/// `implementation`. Different implementations produce different bytecode,
/// matching how real wallet factories stamp clones.
pub fn proxy_runtime_code(implementation: Address) -> Bytes {
    let mut code = Vec::with_capacity(45);
    code.extend_from_slice(&PROXY_PREFIX);
    code.extend_from_slice(implementation.as_slice());
    code.extend_from_slice(&PROXY_SUFFIX);
    Bytes::from(code)
}

/// The address a factory at `deployer` would deploy this wallet to.
pub fn counterfactual_wallet(deployer: Address, salt: B256, implementation: Address) -> Address {
    deployer.create2(salt, keccak256(proxy_runtime_code(implementation)))
}

/// Lands the wallet deployment in the fixture chain: code plus the
/// implementation pointer in the proxy slot.
pub async fn deploy_wallet(chain: &MemoryChainState, wallet: Address, implementation: Address) {
    chain
        .set_code(wallet, proxy_runtime_code(implementation))
        .await;
    chain
        .set_storage(
            wallet,
            EIP1967_IMPLEMENTATION_SLOT,
            implementation.into_word(),
        )
        .await;
}
