use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};

use crate::provider::ChainRpc;

/// In-memory chain fake for resolver and topology tests.
pub(crate) struct MockChain {
    chain_id: String,
    code: Mutex<HashMap<Address, Bytes>>,
    storage: Mutex<HashMap<(Address, H256), H256>>,
}

impl MockChain {
    pub(crate) fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_owned(),
            code: Mutex::new(HashMap::new()),
            storage: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn set_code(&self, address: Address, code: &[u8]) {
        self.code
            .lock()
            .unwrap()
            .insert(address, Bytes::from(code.to_vec()));
    }

    pub(crate) fn clear_code(&self, address: Address) {
        self.code.lock().unwrap().remove(&address);
    }

    pub(crate) fn set_storage(&self, address: Address, slot: H256, value: H256) {
        self.storage.lock().unwrap().insert((address, slot), value);
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn chain_id(&self) -> eyre::Result<String> {
        Ok(self.chain_id.clone())
    }

    async fn code_at(&self, address: Address) -> eyre::Result<Bytes> {
        Ok(self
            .code
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn storage_at(&self, address: Address, slot: H256) -> eyre::Result<H256> {
        Ok(self
            .storage
            .lock()
            .unwrap()
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }
}
