use std::{fs, path::Path};

use ethers::{abi::Abi, types::Bytes};
use eyre::Context;
use serde::Deserialize;

use crate::version;

/// Compiled implementation artifact in the common build-output layout:
/// an `abi` array and a hex `bytecode` string.
#[derive(Clone, Debug, Deserialize)]
pub struct ImplArtifact {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ImplArtifact {
    pub fn new(abi: Abi, bytecode: Bytes) -> Self {
        Self { abi, bytecode }
    }

    pub fn from_file(path: &Path) -> eyre::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }

    /// Version id of this artifact's code and interface.
    pub fn version_id(&self) -> eyre::Result<String> {
        let abi_json = serde_json::to_vec(&self.abi).context("Failed to serialize the ABI")?;
        Ok(version::version_id(&self.bytecode, &abi_json))
    }
}
