use ethers::utils::keccak256;

/// Deterministic identifier of a contract implementation.
///
/// Hashes the creation bytecode and the ABI separately and then together,
/// so equal artifacts produce equal ids across processes and machines.
pub fn version_id(bytecode: &[u8], abi_json: &[u8]) -> String {
    let mut preimage = Vec::with_capacity(64);
    preimage.extend_from_slice(&keccak256(bytecode));
    preimage.extend_from_slice(&keccak256(abi_json));
    hex::encode(keccak256(&preimage))
}
