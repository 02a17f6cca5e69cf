use crate::app::{new_app, AppOptions};
use actix_cors::Cors;
use actix_web::{web, web::ServiceConfig, HttpServer};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use anyhow::anyhow;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;

pub type ConfiguratorFn = dyn Fn(&mut ServiceConfig) + Send + Sync;

/// Runs the HTTP server of a service, with the common middleware in place.
///
/// CORS is permissive, the service is read-only.
pub struct HttpServerBuilder {
    configurator: Option<Arc<ConfiguratorFn>>,
    addr: SocketAddr,
    metrics: Option<PrometheusMetrics>,
}

impl HttpServerBuilder {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            configurator: None,
            addr,
            metrics: None,
        }
    }

    pub fn configure<F>(mut self, configurator: F) -> Self
    where
        F: Fn(&mut ServiceConfig) + Send + Sync + 'static,
    {
        self.configurator = Some(Arc::new(configurator));
        self
    }

    /// Record request metrics into the registry, with metric names prefixed by `namespace`.
    pub fn metrics(mut self, registry: Registry, namespace: impl AsRef<str>) -> anyhow::Result<Self> {
        let metrics = PrometheusMetricsBuilder::new(namespace.as_ref())
            .registry(registry)
            .build()
            .map_err(|err| anyhow!("Failed to create request metrics: {err}"))?;
        self.metrics = Some(metrics);
        Ok(self)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let configurator = self.configurator;
        let metrics = self.metrics;

        let http = HttpServer::new(move || {
            let config = configurator.clone();

            new_app(AppOptions {
                cors: Some(Cors::permissive()),
                metrics: metrics.clone(),
            })
            .app_data(web::JsonConfig::default())
            .configure(|svc| {
                if let Some(config) = config {
                    config(svc);
                }
            })
        });

        log::info!("Binding to: {}", self.addr);
        Ok(http.bind(self.addr)?.run().await?)
    }
}
