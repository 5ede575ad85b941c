use ethers::types::{Address, H256};
use tracing::debug;

use crate::provider::ChainRpc;

/// EIP-1967 administration slot: keccak256("eip1967.proxy.admin") minus one.
pub const EIP1967_ADMIN_SLOT: H256 = H256([
    0xb5, 0x31, 0x27, 0x68, 0x4a, 0x56, 0x8b, 0x31, 0x73, 0xae, 0x13, 0xb9, 0xf8, 0xa6, 0x01,
    0x6e, 0x24, 0x3e, 0x63, 0xb6, 0xe8, 0xee, 0x11, 0x78, 0xd6, 0xa7, 0x17, 0x85, 0x0b, 0x5d,
    0x61, 0x03,
]);

/// Which call shape an upgrade of a given proxy must use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeVariant {
    /// The proxy itself exposes the upgrade entry points.
    Direct,
    /// A live administration contract at this address must make the call.
    ViaAdmin(Address),
}

/// Classifies `proxy` by its administration slot. Purely observational.
///
/// A zero slot, or a slot pointing at an address with no code, means the
/// proxy is upgraded directly through its own entry points; otherwise every
/// upgrade call must be routed through the administration contract.
pub async fn detect<R>(proxy: Address, rpc: &R) -> eyre::Result<UpgradeVariant>
where
    R: ChainRpc + ?Sized,
{
    let word = rpc.storage_at(proxy, EIP1967_ADMIN_SLOT).await?;
    let admin = Address::from_slice(&word.as_bytes()[12..]);
    if admin.is_zero() {
        debug!(?proxy, "admin slot unset");
        return Ok(UpgradeVariant::Direct);
    }
    let code = rpc.code_at(admin).await?;
    if code.is_empty() {
        debug!(?proxy, ?admin, "admin slot set but no code at that address");
        Ok(UpgradeVariant::Direct)
    } else {
        debug!(?proxy, ?admin, "admin contract found");
        Ok(UpgradeVariant::ViaAdmin(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockChain;

    fn admin_word(admin: Address) -> H256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(admin.as_bytes());
        H256(word)
    }

    #[tokio::test]
    async fn zero_slot_is_direct() {
        let chain = MockChain::new("1337");
        let proxy = Address::repeat_byte(0x11);

        let variant = detect(proxy, &chain).await.unwrap();
        assert_eq!(variant, UpgradeVariant::Direct);
    }

    #[tokio::test]
    async fn live_admin_is_via_admin() {
        let chain = MockChain::new("1337");
        let proxy = Address::repeat_byte(0x11);
        let admin = Address::repeat_byte(0x22);
        chain.set_storage(proxy, EIP1967_ADMIN_SLOT, admin_word(admin));
        chain.set_code(admin, &[0x60, 0x80]);

        let variant = detect(proxy, &chain).await.unwrap();
        assert_eq!(variant, UpgradeVariant::ViaAdmin(admin));
    }

    #[tokio::test]
    async fn codeless_admin_is_direct() {
        let chain = MockChain::new("1337");
        let proxy = Address::repeat_byte(0x11);
        let admin = Address::repeat_byte(0x22);
        chain.set_storage(proxy, EIP1967_ADMIN_SLOT, admin_word(admin));

        let variant = detect(proxy, &chain).await.unwrap();
        assert_eq!(variant, UpgradeVariant::Direct);
    }
}
