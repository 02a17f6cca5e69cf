//! Typed representations of the watched cluster resources.
//!
//! Only the fields consumed by the correlation are modelled; unknown fields are ignored on
//! deserialization.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

pub use k8s_openapi::api::apps::v1::Deployment;

/// A buildable unit of an application.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "appstudio.redhat.com",
    version = "v1alpha1",
    kind = "Component",
    namespaced,
    status = "ComponentStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default)]
    pub component_name: String,
    #[serde(default)]
    pub application: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
}

impl Component {
    /// The last known built container image.
    pub fn container_image(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.container_image.as_deref())
            .filter(|image| !image.is_empty())
    }
}

/// A condition, as reported by tekton.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub r#type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of a pipeline or task run, derived from its `Succeeded` condition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Running,
}

fn run_status(conditions: &[Condition]) -> RunStatus {
    match conditions
        .iter()
        .find(|condition| condition.r#type == "Succeeded")
        .map(|condition| condition.status.as_str())
    {
        Some("True") => RunStatus::Succeeded,
        Some("False") => RunStatus::Failed,
        _ => RunStatus::Running,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRef {
    pub name: String,
}

/// A single execution of a CI pipeline.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "tekton.dev",
    version = "v1beta1",
    kind = "PipelineRun",
    namespaced,
    status = "PipelineRunStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<PipelineRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,
}

impl PipelineRun {
    pub fn run_status(&self) -> RunStatus {
        run_status(self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default())
    }

    pub fn start_time(&self) -> Option<&Time> {
        self.status.as_ref().and_then(|status| status.start_time.as_ref())
    }

    pub fn completion_time(&self) -> Option<&Time> {
        self.status.as_ref().and_then(|status| status.completion_time.as_ref())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels().get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations().get(key).map(String::as_str)
    }
}

/// A named result emitted by a task run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunResult {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// A sub-step execution of a pipeline run.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "tekton.dev",
    version = "v1beta1",
    kind = "TaskRun",
    namespaced,
    status = "TaskRunStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,
    /// `taskResults` in v1beta1, `results` in v1
    #[serde(default, alias = "results")]
    pub task_results: Vec<TaskRunResult>,
}

impl TaskRun {
    pub fn start_time(&self) -> Option<&Time> {
        self.status.as_ref().and_then(|status| status.start_time.as_ref())
    }

    /// The name of the pipeline run owning this task run.
    pub fn pipeline_run(&self) -> Option<&str> {
        self.labels()
            .get(crate::labels::TASK_RUN_PIPELINE_RUN)
            .map(String::as_str)
    }

    pub fn result(&self, name: &str) -> Option<&str> {
        self.status
            .as_ref()?
            .task_results
            .iter()
            .find(|result| result.name == name)
            .map(|result| result.value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingComponent {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingGitOpsDeployment {
    #[serde(default)]
    pub component_name: String,
    #[serde(default)]
    pub gitops_deployment: String,
}

/// Binds a snapshot of component images to a target environment.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "appstudio.redhat.com",
    version = "v1alpha1",
    kind = "SnapshotEnvironmentBinding",
    namespaced,
    status = "SnapshotEnvironmentBindingStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvironmentBindingSpec {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub snapshot: String,
    #[serde(default)]
    pub components: Vec<BindingComponent>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvironmentBindingStatus {
    #[serde(default)]
    pub gitops_deployments: Vec<BindingGitOpsDeployment>,
}

impl SnapshotEnvironmentBinding {
    pub fn includes_component(&self, name: &str) -> bool {
        self.spec.components.iter().any(|component| component.name == name)
    }

    /// The target environment, taken from the environment label and falling back to the spec.
    pub fn environment_name(&self) -> Option<&str> {
        self.labels()
            .get(crate::labels::ENVIRONMENT)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .or_else(|| Some(self.spec.environment.as_str()).filter(|name| !name.is_empty()))
    }

    /// The name of the deployment resource recorded for a component.
    pub fn gitops_deployment_for(&self, component: &str) -> Option<&str> {
        self.status
            .as_ref()?
            .gitops_deployments
            .iter()
            .find(|deployment| deployment.component_name == component)
            .map(|deployment| deployment.gitops_deployment.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// A named deployment target.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "appstudio.redhat.com",
    version = "v1alpha1",
    kind = "Environment",
    namespaced,
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_environment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentSource {
    #[serde(default, rename = "repoURL")]
    pub repo_url: String,
    #[serde(default)]
    pub path: String,
}

/// A resource managed by a [`GitOpsDeployment`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResource {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<serde_json::Value>,
}

/// A GitOps managed deployment.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "managed-gitops.redhat.com",
    version = "v1alpha1",
    kind = "GitOpsDeployment",
    namespaced,
    status = "GitOpsDeploymentStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentSpec {
    #[serde(default)]
    pub source: GitOpsDeploymentSource,
    #[serde(default, rename = "type")]
    pub r#type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentStatus {
    #[serde(default)]
    pub resources: Vec<ManagedResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<serde_json::Value>,
}

impl GitOpsDeployment {
    /// The first managed resource of the given kind.
    pub fn managed(&self, kind: &str) -> Option<&ManagedResource> {
        self.status
            .as_ref()?
            .resources
            .iter()
            .find(|resource| resource.kind == kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!([{"type": "Succeeded", "status": "True"}]), RunStatus::Succeeded)]
    #[case(json!([{"type": "Succeeded", "status": "False", "reason": "Failed"}]), RunStatus::Failed)]
    #[case(json!([{"type": "Succeeded", "status": "Unknown"}]), RunStatus::Running)]
    #[case(json!([]), RunStatus::Running)]
    fn test_run_status(#[case] conditions: serde_json::Value, #[case] expected: RunStatus) {
        let run: PipelineRun = serde_json::from_value(json!({
            "apiVersion": "tekton.dev/v1beta1",
            "kind": "PipelineRun",
            "metadata": {"name": "build-1", "namespace": "ns"},
            "spec": {},
            "status": {"conditions": conditions},
        }))
        .unwrap();

        assert_eq!(run.run_status(), expected);
    }

    #[test]
    fn test_task_results_v1() {
        let run: TaskRun = serde_json::from_value(json!({
            "apiVersion": "tekton.dev/v1beta1",
            "kind": "TaskRun",
            "metadata": {"name": "scan", "namespace": "ns", "labels": {"tekton.dev/pipelineRun": "build-1"}},
            "spec": {},
            "status": {"results": [{"name": "CLAIR_SCAN_RESULT", "value": "{}"}]},
        }))
        .unwrap();

        assert_eq!(run.pipeline_run(), Some("build-1"));
        assert_eq!(run.result("CLAIR_SCAN_RESULT"), Some("{}"));
        assert_eq!(run.result("other"), None);
    }

    #[test]
    fn test_binding_environment_fallback() {
        let mut binding = SnapshotEnvironmentBinding::new(
            "binding",
            SnapshotEnvironmentBindingSpec {
                environment: "staging".into(),
                ..Default::default()
            },
        );
        assert_eq!(binding.environment_name(), Some("staging"));

        binding
            .labels_mut()
            .insert(crate::labels::ENVIRONMENT.into(), "development".into());
        assert_eq!(binding.environment_name(), Some("development"));
    }
}
