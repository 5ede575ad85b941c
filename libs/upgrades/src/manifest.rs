use std::{
    collections::{BTreeMap, HashMap},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use ethers::types::{Address, TxHash};
use eyre::{bail, Context};
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

/// Schema tag written into every manifest document. Documents from a newer
/// schema are rejected on load instead of being reinterpreted.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// One successful deployment of a specific implementation version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl DeploymentRecord {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            tx_hash: None,
            metadata: None,
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: TxHash) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDocument {
    schema_version: u32,
    deployments: BTreeMap<String, DeploymentRecord>,
}

impl Default for ManifestDocument {
    fn default() -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            deployments: BTreeMap::new(),
        }
    }
}

/// Durable per-chain store of version id to deployment record.
///
/// One JSON document per chain id under the manifest directory. Records are
/// only ever added or overwritten, never pruned. Writes go through a temp
/// file and an atomic rename, serialized per document by a process-wide
/// lock, so a reader never observes a partial mapping.
pub struct Manifest {
    chain_id: String,
    path: PathBuf,
}

impl Manifest {
    pub fn for_chain(dir: &Path, chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_owned(),
            path: dir.join(format!("chain-{chain_id}.json")),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, version: &str) -> eyre::Result<Option<DeploymentRecord>> {
        Ok(self.load().await?.deployments.get(version).cloned())
    }

    /// Stores `record` under `version`, replacing any previous record for
    /// that version. Returns only once the document is durably on disk.
    pub async fn put(&self, version: &str, record: DeploymentRecord) -> eyre::Result<()> {
        let lock = document_lock(&self.path).await;
        let _guard = lock.lock().await;
        let mut doc = self.load().await?;
        doc.deployments.insert(version.to_owned(), record);
        self.store(&doc).await?;
        debug!(chain = %self.chain_id, version, "manifest updated");
        Ok(())
    }

    async fn load(&self) -> eyre::Result<ManifestDocument> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ManifestDocument::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read manifest {}", self.path.display()))
            }
        };
        let doc: ManifestDocument = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse manifest {}", self.path.display()))?;
        if doc.schema_version > MANIFEST_SCHEMA_VERSION {
            bail!(
                "Manifest {} has schema version {}, but this build only understands up to {}",
                self.path.display(),
                doc.schema_version,
                MANIFEST_SCHEMA_VERSION
            );
        }
        Ok(doc)
    }

    async fn store(&self, doc: &ManifestDocument) -> eyre::Result<()> {
        let dir = self.path.parent().filter(|d| !d.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create manifest directory {}", dir.display()))?;
        }
        let json = serde_json::to_vec_pretty(doc)
            .with_context(|| format!("Failed to serialize manifest {}", self.path.display()))?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)
            .await
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(&json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("Failed to sync {}", tmp.display()))?;
        drop(file);
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
        // The rename is the commit point; it must hit disk too, or a crash
        // could roll the document back after put has returned.
        #[cfg(unix)]
        if let Some(dir) = dir {
            let dir_handle = fs::File::open(dir)
                .await
                .with_context(|| format!("Failed to open {}", dir.display()))?;
            dir_handle
                .sync_all()
                .await
                .with_context(|| format!("Failed to sync {}", dir.display()))?;
        }
        Ok(())
    }
}

// Puts against the same document are read-modify-write cycles; without this
// a concurrent put for a different version id could load the document before
// the first put lands and drop its entry on rename.
async fn document_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let registry = LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock().await;
    map.entry(path.to_owned()).or_default().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(byte: u8) -> DeploymentRecord {
        DeploymentRecord::new(Address::repeat_byte(byte))
            .with_tx_hash(TxHash::repeat_byte(byte ^ 0xff))
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::for_chain(dir.path(), "1337");

        assert_eq!(manifest.get("v1").await.unwrap(), None);
        manifest.put("v1", record(0xaa)).await.unwrap();
        assert_eq!(manifest.get("v1").await.unwrap(), Some(record(0xaa)));

        // A fresh instance sees the persisted document.
        let reopened = Manifest::for_chain(dir.path(), "1337");
        assert_eq!(reopened.get("v1").await.unwrap(), Some(record(0xaa)));
    }

    #[tokio::test]
    async fn put_creates_missing_manifest_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deployments").join("testnet");
        let manifest = Manifest::for_chain(&nested, "7");

        manifest.put("v1", record(0xaa)).await.unwrap();
        assert!(manifest.path().exists());
        assert_eq!(manifest.get("v1").await.unwrap(), Some(record(0xaa)));
    }

    #[tokio::test]
    async fn put_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::for_chain(dir.path(), "1337");

        manifest.put("v1", record(0xaa)).await.unwrap();
        manifest.put("v1", record(0xbb)).await.unwrap();
        assert_eq!(manifest.get("v1").await.unwrap(), Some(record(0xbb)));
    }

    #[tokio::test]
    async fn chains_use_separate_documents() {
        let dir = tempfile::tempdir().unwrap();
        let chain_a = Manifest::for_chain(dir.path(), "1");
        let chain_b = Manifest::for_chain(dir.path(), "2");

        chain_a.put("v1", record(0xaa)).await.unwrap();
        assert_eq!(chain_b.get("v1").await.unwrap(), None);
        assert_ne!(chain_a.path(), chain_b.path());
    }

    #[tokio::test]
    async fn concurrent_puts_keep_both_entries() {
        let dir = tempfile::tempdir().unwrap();
        let first = Manifest::for_chain(dir.path(), "9");
        let second = Manifest::for_chain(dir.path(), "9");

        let (a, b) = tokio::join!(first.put("v1", record(0xaa)), second.put("v2", record(0xbb)));
        a.unwrap();
        b.unwrap();

        let manifest = Manifest::for_chain(dir.path(), "9");
        assert_eq!(manifest.get("v1").await.unwrap(), Some(record(0xaa)));
        assert_eq!(manifest.get("v2").await.unwrap(), Some(record(0xbb)));
    }

    #[tokio::test]
    async fn newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::for_chain(dir.path(), "5");
        std::fs::write(
            manifest.path(),
            r#"{ "schema_version": 99, "deployments": {} }"#,
        )
        .unwrap();

        let err = manifest.get("v1").await.unwrap_err();
        assert!(err.to_string().contains("schema version 99"));
    }

    #[tokio::test]
    async fn optional_fields_may_be_absent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::for_chain(dir.path(), "6");
        std::fs::write(
            manifest.path(),
            format!(
                r#"{{ "schema_version": 1, "deployments": {{ "v1": {{ "address": "{:?}" }} }} }}"#,
                Address::repeat_byte(0xaa)
            ),
        )
        .unwrap();

        let fetched = manifest.get("v1").await.unwrap().unwrap();
        assert_eq!(fetched.address, Address::repeat_byte(0xaa));
        assert_eq!(fetched.tx_hash, None);
        assert_eq!(fetched.metadata, None);
    }
}
