use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, warn};

use unirpc_protocol::{Error, Result};

use crate::transport::{MethodAdaptor, TransportClient};

/// one registered logical application: its method table and the transport
/// client that serves it. the entry owns the client exclusively; the facade
/// only ever reaches a client through its entry.
pub struct ServiceEntry {
    app_id: String,
    methods: HashMap<String, MethodAdaptor>,
    client: Box<dyn TransportClient>,
}

impl ServiceEntry {
    pub fn new(
        app_id: impl Into<String>,
        client: Box<dyn TransportClient>,
        methods: HashMap<String, MethodAdaptor>,
    ) -> Result<ServiceEntry> {
        let app_id = app_id.into();
        if app_id.is_empty() {
            return Err(Error::configuration("service app id must not be empty"));
        }
        Ok(ServiceEntry {
            app_id,
            methods,
            client,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn client(&self) -> &dyn TransportClient {
        self.client.as_ref()
    }

    pub fn adaptor(&self, method: &str) -> Result<&MethodAdaptor> {
        self.methods.get(method).ok_or_else(|| Error::UnknownMethod {
            app_id: self.app_id.clone(),
            method: method.to_owned(),
        })
    }

    /// closes the owned client, used when a `Replace` registration displaces
    /// an entry before the registry ever sealed.
    pub async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|err| Error::transport(&self.app_id, err))
    }
}

// the boxed client is not printable, so the derive is off the table
impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.methods.keys().map(|k| k.as_str()).collect();
        methods.sort_unstable();
        f.debug_struct("ServiceEntry")
            .field("app_id", &self.app_id)
            .field("methods", &methods)
            .finish()
    }
}

/// what `register` does when an app id is already taken. this is a deliberate
/// choice made at builder construction, never an implicit default surprise.
#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString)]
pub enum DuplicatePolicy {
    /// a second registration for the same app id fails.
    Reject,
    /// a second registration displaces the first; the displaced entry is
    /// handed back to the caller, which still owns its client.
    Replace,
}

/// mutable registration surface. consumed by `seal()`, so registration after
/// sealing is impossible by construction.
pub struct RegistryBuilder {
    policy: DuplicatePolicy,
    entries: HashMap<String, ServiceEntry>,
}

impl RegistryBuilder {
    pub fn new() -> RegistryBuilder {
        RegistryBuilder::with_policy(DuplicatePolicy::Reject)
    }

    pub fn with_policy(policy: DuplicatePolicy) -> RegistryBuilder {
        RegistryBuilder {
            policy,
            entries: HashMap::new(),
        }
    }

    /// registers an entry. under `Replace` the displaced entry, if any, is
    /// returned so its client can still be released exactly once.
    pub fn register(&mut self, entry: ServiceEntry) -> Result<Option<ServiceEntry>> {
        if self.entries.contains_key(entry.app_id()) {
            match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(Error::configuration(format!(
                        "app id `{}` is already registered",
                        entry.app_id()
                    )));
                }
                DuplicatePolicy::Replace => {
                    debug!(app_id = entry.app_id(), "replacing registered service");
                    return Ok(self.entries.insert(entry.app_id().to_owned(), entry));
                }
            }
        }
        self.entries.insert(entry.app_id().to_owned(), entry);
        Ok(None)
    }

    pub fn register_service(
        &mut self,
        app_id: impl Into<String>,
        client: Box<dyn TransportClient>,
        methods: HashMap<String, MethodAdaptor>,
    ) -> Result<Option<ServiceEntry>> {
        self.register(ServiceEntry::new(app_id, client, methods)?)
    }

    /// freezes the table. resolution on the sealed registry is a plain
    /// `HashMap` lookup, no locking.
    pub fn seal(self) -> ServiceRegistry {
        ServiceRegistry {
            inner: Arc::new(Inner {
                entries: self.entries,
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        RegistryBuilder::new()
    }
}

struct Inner {
    entries: HashMap<String, ServiceEntry>,
    closed: AtomicBool,
}

/// sealed, read-only table of service entries. cheap to clone and share.
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<Inner>,
}

impl ServiceRegistry {
    pub fn resolve(&self, app_id: &str) -> Result<&ServiceEntry> {
        self.inner
            .entries
            .get(app_id)
            .ok_or_else(|| Error::UnknownService(app_id.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn app_ids(&self) -> impl Iterator<Item = &str> {
        self.inner.entries.keys().map(|k| k.as_str())
    }

    /// releases every registered transport client. every close is attempted
    /// even when earlier ones fail; failures are collected and surfaced as
    /// one aggregate `Error::Shutdown`. a second call is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut failures = Vec::new();
        for entry in self.inner.entries.values() {
            debug!(app_id = entry.app_id(), "closing transport client");
            if let Err(err) = entry.client.close().await {
                warn!(
                    app_id = entry.app_id(),
                    error = %err,
                    "failed to close transport client"
                );
                failures.push(Error::transport(entry.app_id(), err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown(failures))
        }
    }
}
