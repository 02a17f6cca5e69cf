use std::{
    collections::{hash_map::Entry, BTreeMap, HashMap},
    sync::{Arc, Weak},
};

use kube::ResourceExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{next_revision, Collection, WatchAdapter, WatchHandle, WatchRequest, WatchResource, Watched};
use crate::error::TransportError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Key {
    kind: String,
    namespace: String,
}

impl Key {
    fn of<K: WatchResource>(namespace: &str) -> Self {
        Self {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Stored {
    objects: BTreeMap<String, serde_json::Value>,
    loaded: bool,
    error: Option<TransportError>,
}

struct Listener {
    key: Key,
    publish: Box<dyn Fn(&Stored) + Send + Sync>,
}

#[derive(Default)]
struct Inner {
    stored: HashMap<Key, Stored>,
    listeners: HashMap<uuid::Uuid, Listener>,
}

/// Keeps collections in memory, and notifies subscribers on every change.
///
/// Objects are stored in their serialized form, so that the same collection can be read back
/// with any type of the same kind.
#[derive(Clone, Default)]
pub struct MemoryWatcher {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full collection, and mark it loaded.
    pub fn restart<K: WatchResource>(&self, namespace: &str, objects: impl IntoIterator<Item = K>) {
        let objects: BTreeMap<_, _> = objects
            .into_iter()
            .filter_map(|obj| Some((obj.name_any(), to_value(&obj)?)))
            .collect();

        self.update(Key::of::<K>(namespace), move |stored| {
            stored.objects = objects;
            stored.loaded = true;
            stored.error = None;
        });
    }

    /// Add or replace a single object.
    pub fn apply<K: WatchResource>(&self, obj: &K) {
        let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
        let Some(value) = to_value(obj) else {
            return;
        };
        let name = obj.name_any();

        self.update(Key::of::<K>(&namespace), move |stored| {
            stored.objects.insert(name, value);
        });
    }

    pub fn delete<K: WatchResource>(&self, namespace: &str, name: &str) {
        self.update(Key::of::<K>(namespace), |stored| {
            stored.objects.remove(name);
        });
    }

    /// Report a failure of the collection, keeping the current content.
    pub fn fail<K: WatchResource>(&self, namespace: &str, error: TransportError) {
        self.update(Key::of::<K>(namespace), move |stored| {
            stored.error = Some(error);
        });
    }

    /// The number of active subscriptions.
    pub fn listeners(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    fn update<F>(&self, key: Key, f: F)
    where
        F: FnOnce(&mut Stored),
    {
        let mut lock = self.inner.lock();
        let Inner { stored, listeners } = &mut *lock;

        let stored = stored.entry(key.clone()).or_default();
        f(stored);

        for listener in listeners.values().filter(|listener| listener.key == key) {
            (listener.publish)(stored);
        }
    }
}

impl WatchAdapter for MemoryWatcher {
    fn watch<K: WatchResource>(&self, request: WatchRequest) -> WatchHandle<K> {
        let key = Key::of::<K>(&request.namespace);
        let mut lock = self.inner.lock();

        let initial = match lock.stored.get(&key) {
            Some(stored) => project::<K>(&request, stored),
            None => Collection::loading(),
        };
        let (tx, rx) = watch::channel(initial);

        let publish = Box::new(move |stored: &Stored| {
            // a closed channel gets cleaned up when the handle is dropped
            let _ = tx.send(project::<K>(&request, stored));
        });

        let id = loop {
            let id = uuid::Uuid::new_v4();
            if let Entry::Vacant(entry) = lock.listeners.entry(id) {
                entry.insert(Listener { key, publish });
                break id;
            }
        };

        let inner: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        WatchHandle::new(rx, move || {
            if let Some(inner) = inner.upgrade() {
                inner.lock().listeners.remove(&id);
            }
        })
    }
}

fn to_value<K: WatchResource>(obj: &K) -> Option<serde_json::Value> {
    match serde_json::to_value(obj) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Unable to store {} {}: {err}", K::kind(&()), obj.name_any());
            None
        }
    }
}

fn project<K: WatchResource>(request: &WatchRequest, stored: &Stored) -> Collection<K> {
    let items = stored
        .objects
        .iter()
        .filter(|(name, _)| request.name.as_deref().map_or(true, |expected| expected == name.as_str()))
        .filter_map(|(name, value)| match serde_json::from_value::<K>(value.clone()) {
            Ok(obj) => Some(obj),
            Err(err) => {
                log::warn!("Unable to read {} {name}: {err}", K::kind(&()));
                None
            }
        })
        .filter(|obj| request.matches(&obj.name_any(), obj.labels()))
        .collect();

    Watched {
        value: Arc::new(items),
        loaded: stored.loaded,
        error: stored.error.clone(),
        revision: next_revision(),
    }
}
