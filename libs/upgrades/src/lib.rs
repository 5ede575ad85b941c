//!
//! Deployment cache and upgrade orchestration for contracts behind an
//! upgradeable proxy. Implementations are deployed at most once per chain
//! and per version; upgrades pick the call shape matching the proxy's
//! administration topology.
//!

pub mod admin;
pub mod artifact;
pub mod manifest;
pub mod provider;
pub mod resolver;
pub mod upgrade;
pub mod version;

pub use admin::{detect, UpgradeVariant, EIP1967_ADMIN_SLOT};
pub use artifact::ImplArtifact;
pub use manifest::{DeploymentRecord, Manifest, MANIFEST_SCHEMA_VERSION};
pub use provider::{ChainRpc, MiddlewareRpc};
pub use resolver::{Resolver, StaleCachePolicy};
pub use upgrade::{CallSpec, UpgradeOptions, UpgradedProxy, Upgrader};

#[cfg(test)]
mod test_utils;
