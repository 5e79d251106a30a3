use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    ConnectionConfig, Document, Filter, GatewayFactory, InsertResult, StoreError, StoreGateway,
    Update, UpdateResult,
};

#[derive(Default)]
struct Shared {
    documents: Mutex<Vec<Document>>,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    fail_updates: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    updates: AtomicUsize,
}

/// In-process document collection shared by every gateway it creates.
///
/// Cloning is cheap and clones observe the same documents, counters and
/// failure switches.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        if let Ok(mut docs) = store.shared.documents.lock() {
            docs.extend(documents);
        }
        store
    }

    pub fn gateway(&self) -> MemoryGateway {
        MemoryGateway {
            shared: Arc::clone(&self.shared),
            connected: false,
        }
    }

    pub fn find(&self, filter: &Filter) -> Option<Document> {
        self.documents()
            .ok()?
            .iter()
            .find(|doc| filter.matches(doc))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_connect(&self, fail: bool) {
        self.shared.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.shared.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.shared.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.shared.disconnects.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.shared.updates.load(Ordering::SeqCst)
    }

    fn documents(&self) -> Result<MutexGuard<'_, Vec<Document>>, StoreError> {
        self.shared.documents()
    }
}

impl Shared {
    fn documents(&self) -> Result<MutexGuard<'_, Vec<Document>>, StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Connection("memory store poisoned".into()))
    }
}

impl GatewayFactory for MemoryStore {
    fn create(&self) -> Box<dyn StoreGateway> {
        Box::new(self.gateway())
    }
}

pub struct MemoryGateway {
    shared: Arc<Shared>,
    connected: bool,
}

impl MemoryGateway {
    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.connected {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }
}

#[async_trait]
impl StoreGateway for MemoryGateway {
    async fn connect(&mut self, _config: &ConnectionConfig) -> Result<(), StoreError> {
        if self.shared.fail_connect.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store unreachable".into()));
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.connected = false;
        self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_disconnect.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store disconnect failed".into()));
        }
        Ok(())
    }

    async fn find_one(&mut self, filter: &Filter) -> Result<Document, StoreError> {
        self.ensure_connected()?;
        self.shared
            .documents()?
            .iter()
            .find(|doc| filter.matches(doc))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_one(
        &mut self,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        self.ensure_connected()?;
        if self.shared.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Query("memory store rejected update".into()));
        }
        self.shared.updates.fetch_add(1, Ordering::SeqCst);

        let mut documents = self.shared.documents()?;
        let Some(document) = documents.iter_mut().find(|doc| filter.matches(doc)) else {
            return Ok(UpdateResult::default());
        };
        let modified = update.apply(document);

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn insert_one(&mut self, document: Document) -> Result<InsertResult, StoreError> {
        self.ensure_connected()?;
        if !document.is_object() {
            return Err(StoreError::Query("document must be a JSON object".into()));
        }
        self.shared.documents()?.push(document);
        Ok(InsertResult {
            inserted_id: Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            data_dir: PathBuf::from("unused"),
            database: "k8sdeploy".into(),
            collection: "subs".into(),
        }
    }

    #[tokio::test]
    async fn gateways_share_documents() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        let mut writer = store.gateway();
        writer.connect(&config()).await.unwrap();
        writer.insert_one(json!({"company_id": "acme"})).await.unwrap();
        writer.disconnect().await.unwrap();

        assert_eq!(store.len(), 1);
        let mut reader = store.gateway();
        reader.connect(&config()).await.unwrap();
        assert!(reader.find_one(&Filter::equals("company_id", "acme")).await.is_ok());
        assert_eq!(store.connect_count(), 2);
        assert_eq!(store.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn operations_require_connection() {
        let store = MemoryStore::with_documents([json!({"company_id": "acme"})]);
        let mut gateway = store.gateway();

        assert!(matches!(
            gateway.find_one(&Filter::equals("company_id", "acme")).await,
            Err(StoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn injected_disconnect_failure_still_closes_session() {
        let store = MemoryStore::new();
        store.fail_disconnect(true);
        let mut gateway = store.gateway();
        gateway.connect(&config()).await.unwrap();

        assert!(gateway.disconnect().await.is_err());
        assert_eq!(store.disconnect_count(), 1);
        assert!(matches!(
            gateway.find_one(&Filter::equals("company_id", "acme")).await,
            Err(StoreError::NotConnected)
        ));
    }
}
