use std::sync::Arc;
use std::{future::Future, pin::Pin};

use actix_web::{http::uri::Builder, middleware::Logger, web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::Context;
use futures::future::select_all;
use prometheus::{Registry, TextEncoder};
use tokio::signal;

use crate::health::{Checks, HealthChecks};
use crate::tracing::{init_tracing, LogFormat};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

const DEFAULT_BIND_ADDR: &str = "[::1]:9010";

/// Infrastructure
#[derive(Clone, Debug, clap::Args)]
#[command(rename_all_env = "SCREAMING_SNAKE_CASE", next_help_heading = "Infrastructure")]
pub struct InfrastructureConfig {
    /// Enable the infrastructure endpoint
    #[arg(env, long)]
    pub infrastructure_enabled: bool,
    /// Bind addresses of the infrastructure endpoint
    #[arg(long, env, default_value_t = DEFAULT_BIND_ADDR.into())]
    pub infrastructure_bind: String,
    /// Number of workers
    #[arg(long, env, default_value = "1")]
    pub infrastructure_workers: usize,
    /// Format of the log output
    #[arg(long, env, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            infrastructure_enabled: false,
            infrastructure_bind: DEFAULT_BIND_ADDR.into(),
            infrastructure_workers: 1,
            log_format: LogFormat::Text,
        }
    }
}

/// Handed to the main function of an application.
#[derive(Clone)]
pub struct MainContext {
    pub metrics: Arc<Metrics>,
    pub health: Arc<HealthChecks>,
}

pub async fn index(req: HttpRequest) -> HttpResponse {
    let conn = req.connection_info();

    let apis = ["/health/live", "/health/ready", "/health/startup", "/metrics"]
        .into_iter()
        .filter_map(|api| {
            Builder::new()
                .authority(conn.host())
                .scheme(conn.scheme())
                .path_and_query(api)
                .build()
                .ok()
                .map(|uri| uri.to_string())
        })
        .collect::<Vec<_>>();

    HttpResponse::Ok().json(apis)
}

async fn run_checks(checks: &Checks) -> HttpResponse {
    let results = checks.run().await;
    match results.all_up() {
        true => HttpResponse::Ok().json(results),
        false => HttpResponse::ServiceUnavailable().json(results),
    }
}

async fn startup(health: web::Data<HealthChecks>) -> HttpResponse {
    run_checks(&health.startup).await
}

async fn liveness(health: web::Data<HealthChecks>) -> HttpResponse {
    run_checks(&health.liveness).await
}

async fn readiness(health: web::Data<HealthChecks>) -> HttpResponse {
    run_checks(&health.readiness).await
}

async fn render_metrics(metrics: web::Data<Metrics>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();
    match encoder.encode_to_string(&metric_families) {
        Ok(data) => HttpResponse::Ok().content_type("text/plain").body(data),
        Err(e) => HttpResponse::InternalServerError().body(format!("Error retrieving metrics: {:?}", e)),
    }
}

/// Register the infrastructure endpoints.
pub fn configure(svc: &mut web::ServiceConfig, metrics: Arc<Metrics>, health: Arc<HealthChecks>) {
    svc.app_data(web::Data::from(metrics))
        .app_data(web::Data::from(health))
        .service(web::resource("/").to(index))
        .service(
            web::scope("/health")
                .service(web::resource("/live").to(liveness))
                .service(web::resource("/ready").to(readiness))
                .service(web::resource("/startup").to(startup)),
        )
        .service(web::resource("/metrics").to(render_metrics));
}

#[derive(Default)]
pub struct Infrastructure {
    config: InfrastructureConfig,
    metrics: Arc<Metrics>,
    health: Arc<HealthChecks>,
}

impl From<InfrastructureConfig> for Infrastructure {
    fn from(config: InfrastructureConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

impl Infrastructure {
    async fn start_internal(&self) -> anyhow::Result<Pin<Box<dyn Future<Output = anyhow::Result<()>>>>> {
        if !self.config.infrastructure_enabled {
            log::info!("Infrastructure endpoint is disabled");
            return Ok(Box::pin(futures::future::pending()));
        }

        log::info!("Setting up infrastructure endpoint");

        let metrics = self.metrics.clone();
        let health = self.health.clone();

        let mut http = HttpServer::new(move || {
            App::new()
                .wrap(Logger::default())
                .configure(|svc| configure(svc, metrics.clone(), health.clone()))
        });

        if self.config.infrastructure_workers > 0 {
            http = http.workers(self.config.infrastructure_workers);
        }

        http = http
            .bind(&self.config.infrastructure_bind)
            .context("Failed to bind infrastructure endpoint")?;

        Ok(Box::pin(async move {
            log::info!("Running infrastructure endpoint on:");
            for (addr, scheme) in http.addrs_with_scheme() {
                log::info!("   {scheme}://{addr}");
            }
            http.run().await.context("Failed to run infrastructure endpoint")?;
            Ok::<_, anyhow::Error>(())
        }))
    }

    /// Initialize logging, and run the main function until it returns or the process gets
    /// terminated.
    pub async fn run<F, Fut>(self, id: &str, main: F) -> anyhow::Result<()>
    where
        F: FnOnce(MainContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        init_tracing(id, self.config.log_format);

        let context = MainContext {
            metrics: self.metrics.clone(),
            health: self.health.clone(),
        };

        let main = Box::pin(main(context)) as Pin<Box<dyn Future<Output = anyhow::Result<()>>>>;
        let runner = self.start_internal().await?;
        let sigint = Box::pin(async { signal::ctrl_c().await.context("termination failed") });

        #[allow(unused_mut)]
        let mut tasks = vec![runner, main, sigint];

        #[cfg(unix)]
        {
            let sigterm = Box::pin(async {
                signal(SignalKind::terminate())?.recv().await;
                Ok(())
            });
            tasks.push(sigterm);
        }

        let (result, _index, _others) = select_all(tasks).await;
        result
    }
}

#[derive(Default)]
pub struct Metrics {
    registry: Registry,
}

impl Metrics {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::health::checks::Probe;
    use actix_web::{http::StatusCode, test as actix};

    #[actix_web::test]
    async fn test_readiness_follows_probe() {
        let metrics = Arc::new(Metrics::default());
        let health = Arc::new(HealthChecks::default());
        let (probe, check) = Probe::new("Not ready");
        health.readiness.register("probe", check).await;

        let app =
            actix::init_service(App::new().configure(|svc| configure(svc, metrics.clone(), health.clone()))).await;

        let resp = actix::call_service(&app, actix::TestRequest::get().uri("/health/ready").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        probe.set(true);
        let resp = actix::call_service(&app, actix::TestRequest::get().uri("/health/ready").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = actix::call_service(&app, actix::TestRequest::get().uri("/health/live").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_metrics() {
        let metrics = Arc::new(Metrics::default());
        let counter = prometheus::IntCounter::new("test_counter", "A counter").unwrap();
        metrics.registry().register(Box::new(counter.clone())).unwrap();
        counter.inc();

        let app = actix::init_service(
            App::new().configure(|svc| configure(svc, metrics.clone(), Arc::new(HealthChecks::default()))),
        )
        .await;

        let body = actix::call_and_read_body(&app, actix::TestRequest::get().uri("/metrics").to_request()).await;
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("test_counter 1"));
    }
}
