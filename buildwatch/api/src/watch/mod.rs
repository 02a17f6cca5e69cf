//! Subscriptions to live collections of cluster resources.

mod cluster;
mod memory;

pub use cluster::*;
pub use memory::*;

use std::{
    collections::BTreeMap,
    fmt::{Debug, Display, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;

use crate::{error::TransportError, selector::Selector};

static REVISION: AtomicU64 = AtomicU64::new(1);

/// A revision which is unique for the lifetime of the process.
pub fn next_revision() -> u64 {
    REVISION.fetch_add(1, Ordering::Relaxed)
}

/// The current value of a subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct Watched<T> {
    pub value: T,
    /// The initial load completed.
    pub loaded: bool,
    pub error: Option<TransportError>,
    /// Changes whenever a new value gets published, `0` for withheld queries.
    pub revision: u64,
}

/// A list of resources, as delivered by a subscription.
pub type Collection<K> = Watched<Arc<Vec<K>>>;

impl<K> Watched<Arc<Vec<K>>> {
    pub fn loading() -> Self {
        Self {
            value: Arc::new(vec![]),
            loaded: false,
            error: None,
            revision: next_revision(),
        }
    }

    pub fn ready(items: Vec<K>) -> Self {
        Self {
            value: Arc::new(items),
            loaded: true,
            error: None,
            revision: next_revision(),
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            value: Arc::new(vec![]),
            loaded: false,
            error: Some(error),
            revision: next_revision(),
        }
    }

    /// The value of a query whose prerequisite is not present: loaded, but empty.
    pub fn withheld() -> Self {
        Self {
            value: Arc::new(vec![]),
            loaded: true,
            error: None,
            revision: 0,
        }
    }

    pub fn items(&self) -> &[K] {
        &self.value
    }

    /// The value of a single object subscription.
    pub fn single(&self) -> Option<&K> {
        self.value.first()
    }
}

/// What to subscribe to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WatchRequest {
    pub namespace: String,
    /// Watch a single object by name, instead of a list.
    pub name: Option<String>,
    pub selector: Option<Selector>,
}

impl WatchRequest {
    pub fn list(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: None,
            selector: None,
        }
    }

    pub fn object(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: Some(name.into()),
            selector: None,
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn is_list(&self) -> bool {
        self.name.is_none()
    }

    /// Check if an object of the requested namespace is part of the result.
    pub fn matches(&self, name: &str, labels: &BTreeMap<String, String>) -> bool {
        self.name.as_deref().map_or(true, |expected| expected == name)
            && self.selector.as_ref().map_or(true, |selector| selector.matches(labels))
    }
}

impl Display for WatchRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.namespace)?;
        if let Some(name) = &self.name {
            write!(f, "/{name}")?;
        }
        if let Some(selector) = &self.selector {
            write!(f, " [{selector}]")?;
        }
        Ok(())
    }
}

/// A live subscription. Dropping the handle releases the subscription.
pub struct WatchHandle<K> {
    rx: watch::Receiver<Collection<K>>,
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync + 'static>>,
}

impl<K> WatchHandle<K> {
    pub fn new(rx: watch::Receiver<Collection<K>>, unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            rx,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn current(&self) -> Collection<K> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published value.
    ///
    /// If the source went away, this never returns.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

impl<K> Drop for WatchHandle<K> {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl<K> Debug for WatchHandle<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").finish_non_exhaustive()
    }
}

/// A resource which can be watched.
pub trait WatchResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> WatchResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Subscribes to collections of resources.
///
/// Subscribing never blocks. The returned handle starts with "not loaded", unless the adapter
/// already has the data, and gets updated as the collection changes.
pub trait WatchAdapter: Clone + Send + Sync + 'static {
    fn watch<K: WatchResource>(&self, request: WatchRequest) -> WatchHandle<K>;
}
