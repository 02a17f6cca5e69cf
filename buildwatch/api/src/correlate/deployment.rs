use buildwatch_model::{
    data::DeploymentRow,
    labels,
    resources::{Deployment, Environment, GitOpsDeployment, SnapshotEnvironmentBinding},
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::ResourceExt;

use crate::watch::{Collection, WatchRequest};

/// Tooltip of the disabled pod log control.
pub const POD_LOGS_UNAVAILABLE: &str = "Pod logs are not available";

/// The live deployment managed by a deployment CR.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeploymentTarget {
    pub namespace: String,
    pub name: String,
}

impl DeploymentTarget {
    pub fn request(&self) -> WatchRequest {
        WatchRequest::object(&self.namespace, &self.name)
    }
}

/// A deployment row, before the live deployment is known.
#[derive(Clone, Debug, PartialEq)]
pub struct RowPlan {
    pub key: String,
    pub environment_name: Option<String>,
    pub environment_display_name: String,
    pub deployment_cr: Option<GitOpsDeployment>,
    pub target: Option<DeploymentTarget>,
}

/// Bindings which include the component.
pub fn relevant_bindings<'a>(
    bindings: &'a [SnapshotEnvironmentBinding],
    component: &'a str,
) -> impl Iterator<Item = &'a SnapshotEnvironmentBinding> + 'a {
    bindings.iter().filter(move |binding| binding.includes_component(component))
}

fn target_of(deployment_cr: &GitOpsDeployment) -> Option<DeploymentTarget> {
    let resource = deployment_cr.managed("Deployment")?;
    let namespace = match resource.namespace.as_str() {
        "" => deployment_cr.namespace()?,
        namespace => namespace.to_string(),
    };
    Some(DeploymentTarget {
        namespace,
        name: resource.name.clone(),
    })
}

/// Selects the bindings of a namespace.
///
/// Bindings are matched to the application by their spec, not by label.
pub fn bindings_request(namespace: &str) -> WatchRequest {
    WatchRequest::list(namespace)
}

/// Plan one row per binding of the application which includes the component.
pub fn plan_rows(
    component: &str,
    application: &str,
    bindings: &[SnapshotEnvironmentBinding],
    deployment_crs: &[GitOpsDeployment],
    environments: &[Environment],
) -> Vec<RowPlan> {
    relevant_bindings(bindings, component)
        .filter(|binding| binding.spec.application == application)
        .map(|binding| {
            let environment_name = binding.environment_name().map(ToString::to_string);

            let deployment_cr = binding.gitops_deployment_for(component).and_then(|name| {
                deployment_crs
                    .iter()
                    .find(|deployment_cr| deployment_cr.name_any() == name)
                    .cloned()
            });

            let environment_display_name = environment_name
                .as_deref()
                .and_then(|name| environments.iter().find(|env| env.name_any() == name))
                .map(|env| env.spec.display_name.clone())
                .filter(|display_name| !display_name.is_empty())
                .or_else(|| environment_name.clone())
                .unwrap_or_default();

            RowPlan {
                key: binding.uid().unwrap_or_else(|| binding.name_any()),
                target: deployment_cr.as_ref().and_then(target_of),
                environment_name,
                environment_display_name,
                deployment_cr,
            }
        })
        .collect()
}

fn pod_selector(deployment: &Deployment) -> Option<&LabelSelector> {
    let selector = &deployment.spec.as_ref()?.selector;
    let has_labels = selector.match_labels.as_ref().is_some_and(|labels| !labels.is_empty());
    let has_expressions = selector
        .match_expressions
        .as_ref()
        .is_some_and(|expressions| !expressions.is_empty());
    (has_labels || has_expressions).then_some(selector)
}

/// Complete a row with the state of its live deployment.
///
/// Pod logs are only accessible in the development environment, once the deployment loaded
/// without error and exposes a pod selector.
pub fn resolve_row(plan: &RowPlan, live: &Collection<Deployment>) -> DeploymentRow {
    let deployment_error = live
        .error
        .as_ref()
        .map(|err| err.to_info("Unable to load the deployment"));

    let live_deployment = live.loaded.then(|| live.single().cloned()).flatten();

    let pod_selector = match plan.environment_name.as_deref() {
        Some(labels::DEVELOPMENT_ENVIRONMENT) if deployment_error.is_none() => {
            live_deployment.as_ref().and_then(pod_selector).cloned()
        }
        _ => None,
    };
    let enabled = pod_selector.is_some();

    DeploymentRow {
        key: plan.key.clone(),
        environment_name: plan.environment_name.clone(),
        environment_display_name: plan.environment_display_name.clone(),
        deployment_cr: plan.deployment_cr.clone(),
        live_deployment,
        deployment_error,
        pod_selector,
        pod_log_access_enabled: enabled,
        pod_log_access_hint: (!enabled).then(|| POD_LOGS_UNAVAILABLE.to_string()),
    }
}
