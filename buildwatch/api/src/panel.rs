//! Drives the subscriptions of a single rendered component panel.

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use buildwatch_model::{
    data::ComponentView,
    resources::{Component, Deployment, Environment, GitOpsDeployment, PipelineRun, SnapshotEnvironmentBinding, TaskRun},
};
use kube::ResourceExt;
use prometheus::{IntCounter, IntGauge, Registry};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{
    context::WorkspaceContext,
    correlate::{self, build, commit, deployment, Correlator, Snapshot},
    dependent::DependentWatch,
    selector::SelectorError,
    watch::{WatchAdapter, WatchHandle, WatchRequest},
};

#[derive(Clone)]
pub struct PanelMetrics {
    open: IntGauge,
    published: IntCounter,
}

impl PanelMetrics {
    pub fn register(registry: &Registry) -> anyhow::Result<Self> {
        let open = IntGauge::new("buildwatch_open_panels", "Number of open component panels")?;
        let published = IntCounter::new("buildwatch_views_published_total", "Number of published component views")?;
        registry.register(Box::new(open.clone()))?;
        registry.register(Box::new(published.clone()))?;
        Ok(Self { open, published })
    }
}

type Changed<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// All subscriptions of a component panel.
///
/// Base subscriptions live as long as the panel. Dependent ones are activated once the data
/// they derive their query from is known.
pub struct ComponentPanel<A: WatchAdapter> {
    adapter: A,
    correlator: Correlator,

    component: WatchHandle<Component>,
    pipeline_runs: WatchHandle<PipelineRun>,
    deployment_crs: WatchHandle<GitOpsDeployment>,
    environments: WatchHandle<Environment>,

    task_runs: DependentWatch<TaskRun>,
    test_runs: DependentWatch<PipelineRun>,
    bindings: DependentWatch<SnapshotEnvironmentBinding>,
    /// Live deployments, by row key.
    deployments: BTreeMap<String, DependentWatch<Deployment>>,
}

impl<A: WatchAdapter> ComponentPanel<A> {
    /// Open the base subscriptions of a component.
    pub fn open(adapter: A, context: WorkspaceContext, component: impl Into<String>) -> Result<Self, SelectorError> {
        let component = component.into();
        let namespace = context.namespace.clone();

        let builds = WatchRequest::list(&namespace).with_selector(build::build_selector(&component)?);
        let pipeline_runs = adapter.watch(builds);

        Ok(Self {
            component: adapter.watch(WatchRequest::object(&namespace, &component)),
            pipeline_runs,
            deployment_crs: adapter.watch(WatchRequest::list(&namespace)),
            environments: adapter.watch(WatchRequest::list(&namespace)),
            task_runs: DependentWatch::new(),
            test_runs: DependentWatch::new(),
            bindings: DependentWatch::new(),
            deployments: Default::default(),
            correlator: Correlator::new(context, component),
            adapter,
        })
    }

    /// Bring dependent subscriptions in line with the current data, and capture a snapshot.
    ///
    /// Stages are reconciled in data dependency order: the latest build gates the task runs,
    /// the test pipelines and the bindings, the rows derived from the bindings gate the live deployments.
    pub fn reconcile(&mut self) -> Snapshot {
        let namespace = self.correlator.context().namespace.clone();
        let component = self.correlator.component().to_string();

        let mut snapshot = Snapshot {
            component: self.component.current(),
            pipeline_runs: self.pipeline_runs.current(),
            deployment_crs: self.deployment_crs.current(),
            environments: self.environments.current(),
            ..Default::default()
        };

        let latest = snapshot.latest_build(&component);
        let run_name = latest.map(|run| run.name_any());
        let application = latest.and_then(correlate::application_of).map(ToString::to_string);
        let sha = latest.and_then(commit::commit_sha);

        self.task_runs
            .activate(&self.adapter, run_name.as_deref(), |name| build::task_runs_request(&namespace, name));
        self.test_runs.activate(
            &self.adapter,
            application.as_deref().map(|application| (application, sha.as_deref())),
            |(application, sha)| build::test_runs_request(&namespace, application, sha),
        );
        self.bindings.activate(&self.adapter, application.as_deref(), |_| {
            Some(deployment::bindings_request(&namespace))
        });
        snapshot.task_runs = self.task_runs.current();
        snapshot.test_runs = self.test_runs.current();
        snapshot.bindings = self.bindings.current();

        let rows = match &application {
            Some(application) => snapshot.rows(&component, application),
            None => vec![],
        };

        self.deployments.retain(|key, _| rows.iter().any(|row| &row.key == key));
        for row in &rows {
            let stage = self.deployments.entry(row.key.clone()).or_default();
            stage.activate(&self.adapter, row.target.as_ref(), |target| Some(target.request()));
            snapshot.deployments.insert(row.key.clone(), stage.current());
        }

        snapshot
    }

    /// Reconcile and derive the current view.
    pub fn view(&mut self) -> Arc<ComponentView> {
        let snapshot = self.reconcile();
        self.correlator.view(&snapshot)
    }

    /// Wait until any of the active subscriptions changed.
    pub async fn changed(&mut self) {
        let mut changes: Vec<Changed<'_>> = vec![
            Box::pin(self.component.changed()),
            Box::pin(self.pipeline_runs.changed()),
            Box::pin(self.deployment_crs.changed()),
            Box::pin(self.environments.changed()),
        ];

        if let Some(handle) = self.task_runs.handle_mut() {
            changes.push(Box::pin(handle.changed()));
        }
        if let Some(handle) = self.test_runs.handle_mut() {
            changes.push(Box::pin(handle.changed()));
        }
        if let Some(handle) = self.bindings.handle_mut() {
            changes.push(Box::pin(handle.changed()));
        }
        for stage in self.deployments.values_mut() {
            if let Some(handle) = stage.handle_mut() {
                changes.push(Box::pin(handle.changed()));
            }
        }

        futures::future::select_all(changes).await;
    }

    /// The number of active dependent subscriptions.
    pub fn active_dependents(&self) -> usize {
        usize::from(self.task_runs.is_active())
            + usize::from(self.test_runs.is_active())
            + usize::from(self.bindings.is_active())
            + self.deployments.values().filter(|stage| stage.is_active()).count()
    }

    /// Run the panel in the background, publishing every changed view.
    pub fn spawn(self, metrics: Option<PanelMetrics>) -> PanelHandle {
        let context = self.correlator.context();
        let initial = ComponentView::loading(self.correlator.component(), &context.namespace);

        let (tx, rx) = watch::channel(Arc::new(initial));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        if let Some(metrics) = &metrics {
            metrics.open.inc();
        }
        let task = tokio::spawn(self.run(tx, shutdown_rx, metrics.clone()));

        PanelHandle {
            view: rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            metrics,
        }
    }

    async fn run(
        mut self,
        tx: watch::Sender<Arc<ComponentView>>,
        mut shutdown: oneshot::Receiver<()>,
        metrics: Option<PanelMetrics>,
    ) {
        let component = self.correlator.component().to_string();
        log::debug!("Opened panel of {component}");

        loop {
            let view = self.view();

            let published = tx.send_if_modified(|current| {
                if *current == view {
                    false
                } else {
                    *current = view;
                    true
                }
            });

            if published {
                if let Some(metrics) = &metrics {
                    metrics.published.inc();
                }
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                _ = self.changed() => {}
            }
        }

        log::debug!("Closed panel of {component}");
    }
}

/// Access to a running panel.
///
/// Dropping the handle tears down the panel without waiting for it.
pub struct PanelHandle {
    view: watch::Receiver<Arc<ComponentView>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    metrics: Option<PanelMetrics>,
}

impl PanelHandle {
    /// The latest published view.
    pub fn view(&self) -> Arc<ComponentView> {
        self.view.borrow().clone()
    }

    /// Receive every published view.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ComponentView>> {
        self.view.clone()
    }

    /// Wait until the latest build is no longer loading, or the timeout expired.
    pub async fn settled(&self, timeout: Duration) -> Arc<ComponentView> {
        let mut rx = self.view.clone();
        let settled = tokio::time::timeout(timeout, async {
            rx.wait_for(|view| !view.latest_build.is_loading()).await.is_ok()
        })
        .await;

        if !matches!(settled, Ok(true)) {
            log::debug!("Panel did not settle within {timeout:?}");
        }

        self.view()
    }

    /// Stop the panel and release all of its subscriptions.
    pub async fn teardown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    log::warn!("Panel task failed: {err}");
                }
            }
        }
    }
}

impl Drop for PanelHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(metrics) = &self.metrics {
            metrics.open.dec();
        }
    }
}
