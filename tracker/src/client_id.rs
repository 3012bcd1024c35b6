use crate::metrics_defs::{CLIENT_ID_CREATED, counter};
use crate::property_store::{FilesystemPropertyStore, PropertyStore, StoreError};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Property key under which the identifier is persisted.
pub const CLIENT_ID_KEY: &str = "clientId";

struct ClientIdInner {
    store: Arc<dyn PropertyStore>,
    // Held across read-or-create so concurrent first calls agree on one identifier.
    cached: Mutex<Option<String>>,
}

/// Resolves the pseudonymous per-user client identifier.
///
/// The identifier is read from the property store once and then served from
/// memory for the lifetime of the manager. When the store has no identifier a
/// random UUID is generated and written back; this is the only write the
/// manager ever performs.
#[derive(Clone)]
pub struct ClientIdManager {
    inner: Arc<ClientIdInner>,
}

impl ClientIdManager {
    /// Uses the given store, or the user-scoped filesystem store if `None`.
    pub fn new(store: Option<Arc<dyn PropertyStore>>) -> Result<Self, StoreError> {
        let store = match store {
            Some(store) => store,
            None => Arc::new(FilesystemPropertyStore::user_default()?),
        };
        Ok(Self::with_store(store))
    }

    pub fn with_store(store: Arc<dyn PropertyStore>) -> Self {
        ClientIdManager {
            inner: Arc::new(ClientIdInner {
                store,
                cached: Mutex::new(None),
            }),
        }
    }

    pub fn client_id(&self) -> Result<String, StoreError> {
        let mut cached = self.inner.cached.lock();

        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        if let Some(id) = self.inner.store.get(CLIENT_ID_KEY)? {
            tracing::debug!(client_id = %id, "Loaded client id from property store");
            *cached = Some(id.clone());
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        // Cached before the write: if persisting fails the process keeps using
        // this identifier, and the next process generates its own.
        *cached = Some(id.clone());
        self.inner.store.set(CLIENT_ID_KEY, &id)?;

        counter!(CLIENT_ID_CREATED).increment(1);
        // The identifier itself stays at debug; info events reach error reporting.
        tracing::info!("Generated new client id");
        tracing::debug!(client_id = %id, "Persisted new client id");

        Ok(id)
    }

    /// The identifier held in memory, without touching the store.
    pub fn cached(&self) -> Option<String> {
        self.inner.cached.lock().clone()
    }
}
