use std::{net::SocketAddr, process::ExitCode, str::FromStr};

use actix_web::web;
use anyhow::Context;
use buildwatch_infrastructure::{
    app::http::HttpServerBuilder, health::checks::Probe, Infrastructure, InfrastructureConfig, MainContext,
};

pub mod context;
pub mod correlate;
pub mod dependent;
pub mod error;
pub mod panel;
pub mod selector;
pub mod server;
pub mod view;
pub mod watch;

use crate::{
    context::WorkspaceContext,
    panel::PanelMetrics,
    server::AppState,
    watch::{ClusterWatcher, WatchMetrics},
};

#[derive(clap::Args, Debug)]
#[command(about = "Run the api server", args_conflicts_with_subcommands = true)]
pub struct Run {
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(short = 'p', long = "port", default_value_t = 8080)]
    pub port: u16,

    /// Namespace of the workspace, used when a request doesn't name one
    #[arg(long, env = "BUILDWATCH_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Name of the workspace, used for console links
    #[arg(long, env = "BUILDWATCH_WORKSPACE", default_value = "")]
    pub workspace: String,

    /// How long a request waits for the latest build to load
    #[arg(long, env = "BUILDWATCH_SETTLE_TIMEOUT", default_value = "10s")]
    pub settle_timeout: humantime::Duration,

    #[command(flatten)]
    pub infra: InfrastructureConfig,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        Infrastructure::from(self.infra.clone())
            .run("buildwatch-api", |context| async move { self.serve(context).await })
            .await?;

        Ok(ExitCode::SUCCESS)
    }

    async fn serve(self, context: MainContext) -> anyhow::Result<()> {
        let (probe, check) = Probe::new("Cluster API not reachable");
        context.health.readiness.register("cluster", check).await;

        let client = kube::Client::try_default()
            .await
            .context("Failed to create cluster client")?;
        client
            .apiserver_version()
            .await
            .context("Failed to reach the cluster API")?;
        probe.set(true);

        let registry = context.metrics.registry();
        let adapter = ClusterWatcher::new(client, WatchMetrics::register(registry)?);

        let state = web::Data::new(AppState {
            adapter,
            context: WorkspaceContext::new(self.namespace, self.workspace),
            settle_timeout: self.settle_timeout.into(),
            metrics: Some(PanelMetrics::register(registry)?),
        });

        let addr = SocketAddr::from_str(&format!("{}:{}", self.bind, self.port))?;
        log::info!("Serving component views on {addr}");

        HttpServerBuilder::new(addr)
            .metrics(registry.clone(), "buildwatch")?
            .configure(move |svc| server::configure(svc, state.clone()))
            .run()
            .await
    }
}
