mod ws;

use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::{
    context::WorkspaceContext,
    error::Error,
    panel::{ComponentPanel, PanelMetrics},
    watch::WatchAdapter,
};

/// Shared state of the HTTP surface.
pub struct AppState<A: WatchAdapter> {
    pub adapter: A,
    /// Used when a request doesn't name a namespace or workspace.
    pub context: WorkspaceContext,
    pub settle_timeout: Duration,
    pub metrics: Option<PanelMetrics>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ComponentQuery {
    pub namespace: Option<String>,
    pub workspace: Option<String>,
}

impl<A: WatchAdapter> AppState<A> {
    fn open(&self, component: String, query: &ComponentQuery) -> Result<ComponentPanel<A>, Error> {
        let context = WorkspaceContext {
            namespace: query.namespace.clone().unwrap_or_else(|| self.context.namespace.clone()),
            workspace: query.workspace.clone().unwrap_or_else(|| self.context.workspace.clone()),
        };

        if context.namespace.is_empty() {
            return Err(Error::BadRequest("no namespace given".into()));
        }

        Ok(ComponentPanel::open(self.adapter.clone(), context, component)?)
    }
}

async fn get_component<A: WatchAdapter>(
    state: web::Data<AppState<A>>,
    path: web::Path<String>,
    query: web::Query<ComponentQuery>,
) -> Result<HttpResponse, Error> {
    let panel = state.open(path.into_inner(), &query)?.spawn(state.metrics.clone());

    let view = panel.settled(state.settle_timeout).await;
    panel.teardown().await;

    Ok(HttpResponse::Ok().json(view.as_ref()))
}

async fn component_stream<A: WatchAdapter>(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState<A>>,
    path: web::Path<String>,
    query: web::Query<ComponentQuery>,
) -> Result<HttpResponse, Error> {
    let panel = state.open(path.into_inner(), &query)?;

    let (res, session, msg_stream) = actix_ws::handle(&req, stream)?;
    actix_web::rt::spawn(ws::run(panel.spawn(state.metrics.clone()), session, msg_stream));

    Ok(res)
}

/// Register the component endpoints.
pub fn configure<A: WatchAdapter>(config: &mut web::ServiceConfig, state: web::Data<AppState<A>>) {
    config.app_data(state).service(
        web::scope("/api/v1/components")
            .route("/{name}", web::get().to(get_component::<A>))
            .route("/{name}/stream", web::get().to(component_stream::<A>)),
    );
}
