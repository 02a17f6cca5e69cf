use std::{collections::BTreeMap, pin::pin, sync::Arc};

use futures::{Stream, StreamExt};
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Client, ResourceExt,
};
use prometheus::{IntCounter, IntGauge, Registry};
use tokio::sync::watch;

use super::{next_revision, Collection, WatchAdapter, WatchHandle, WatchRequest, WatchResource, Watched};
use crate::error::TransportError;

#[derive(Clone)]
pub struct WatchMetrics {
    active: IntGauge,
    errors: IntCounter,
}

impl WatchMetrics {
    pub fn register(registry: &Registry) -> anyhow::Result<Self> {
        let active = IntGauge::new("buildwatch_active_watches", "Number of active cluster watches")?;
        let errors = IntCounter::new("buildwatch_watch_errors_total", "Number of failed cluster watch attempts")?;
        registry.register(Box::new(active.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        Ok(Self { active, errors })
    }
}

/// Watches collections on the cluster API.
#[derive(Clone)]
pub struct ClusterWatcher {
    client: Client,
    metrics: WatchMetrics,
}

impl ClusterWatcher {
    pub fn new(client: Client, metrics: WatchMetrics) -> Self {
        Self { client, metrics }
    }
}

impl WatchAdapter for ClusterWatcher {
    fn watch<K: WatchResource>(&self, request: WatchRequest) -> WatchHandle<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &request.namespace);

        let mut config = watcher::Config::default();
        if let Some(selector) = request.selector.as_ref().filter(|selector| !selector.is_empty()) {
            config = config.labels(&selector.to_string());
        }
        if let Some(name) = &request.name {
            config = config.fields(&format!("metadata.name={name}"));
        }

        log::debug!("Watching {}: {request}", K::kind(&()));

        let (tx, rx) = watch::channel(Collection::loading());
        let stream = watcher(api, config).default_backoff();

        let metrics = self.metrics.clone();
        metrics.active.inc();
        let task = tokio::spawn(run(stream, tx, metrics.errors.clone()));

        WatchHandle::new(rx, move || {
            task.abort();
            metrics.active.dec();
        })
    }
}

async fn run<K, S>(stream: S, tx: watch::Sender<Collection<K>>, errors: IntCounter)
where
    K: WatchResource,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    let mut stream = pin!(stream);
    let mut objects = BTreeMap::<String, K>::new();

    while let Some(evt) = stream.next().await {
        match evt {
            Ok(watcher::Event::Applied(obj)) => {
                objects.insert(obj.name_any(), obj);
            }
            Ok(watcher::Event::Deleted(obj)) => {
                objects.remove(&obj.name_any());
            }
            Ok(watcher::Event::Restarted(objs)) => {
                objects = objs.into_iter().map(|obj| (obj.name_any(), obj)).collect();
            }
            Err(err) => {
                // keep the last known value, the watcher backs off and retries
                log::warn!("Failed to watch {}: {err}", K::kind(&()));
                errors.inc();
                let err = TransportError::from(&err);
                tx.send_modify(|current| {
                    current.error = Some(err);
                    current.revision = next_revision();
                });
                continue;
            }
        }

        let value = Watched {
            value: Arc::new(objects.values().cloned().collect()),
            loaded: true,
            error: None,
            revision: next_revision(),
        };

        if tx.send(value).is_err() {
            log::debug!("Lost all receivers of {} watch", K::kind(&()));
            break;
        }
    }
}
