use std::fmt::{Display, Formatter};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, Time};
use serde::{Deserialize, Serialize};

use crate::resources::{Deployment, GitOpsDeployment, PipelineRun, RunStatus, TaskRun};

/// Everything the presentation layer renders for a single component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentView {
    pub component: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
    /// Command to download the SBOM of the container image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sbom_command: Option<String>,
    pub latest_build: LatestBuild,
    #[serde(default)]
    pub deployments: Vec<DeploymentRow>,
}

impl ComponentView {
    pub fn loading(component: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            namespace: namespace.into(),
            container_image: None,
            sbom_command: None,
            latest_build: LatestBuild::Loading,
            deployments: vec![],
        }
    }
}

/// State of the latest successful build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LatestBuild {
    Loading,
    Error(ErrorInfo),
    /// No successful build exists.
    Empty,
    Ready(Box<BuildDetails>),
}

impl LatestBuild {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn details(&self) -> Option<&BuildDetails> {
        match self {
            Self::Ready(details) => Some(details),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub title: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDetails {
    pub pipeline_run: PipelineRun,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<Commit>,
    #[serde(default)]
    pub task_runs: Vec<TaskRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanSummary>,
    /// Test pipelines of the application, for the commit of the build when known.
    #[serde(default)]
    pub test_runs: Vec<TestRun>,
    /// Secondary inputs which did not finish loading yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<Input>,
}

/// The input collections of a component view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Input {
    Component,
    TaskRuns,
    TestPipelineRuns,
    SnapshotEnvironmentBindings,
    GitOpsDeployments,
    Environments,
}

impl Display for Input {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Component => "component",
            Self::TaskRuns => "task runs",
            Self::TestPipelineRuns => "test pipeline runs",
            Self::SnapshotEnvironmentBindings => "snapshot environment bindings",
            Self::GitOpsDeployments => "gitops deployments",
            Self::Environments => "environments",
        };
        f.write_str(name)
    }
}

/// The commit which triggered a build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_number: Option<String>,
    /// Console path of the commit details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Commit {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request_number.is_some() || self.event_type.as_deref() == Some("pull_request")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerabilities {
    #[serde(default)]
    pub critical: u32,
    #[serde(default)]
    pub high: u32,
    #[serde(default)]
    pub medium: u32,
    #[serde(default)]
    pub low: u32,
}

/// Outcome of a test pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub name: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,
}

/// Summed security scan results of a build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub vulnerabilities: Vulnerabilities,
    /// Task runs which reported scan results.
    pub task_runs: Vec<String>,
}

/// A deployment of the component to an environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRow {
    /// Stable key of the row (the binding's UID, or its name).
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_name: Option<String>,
    pub environment_display_name: String,
    #[serde(default, rename = "deploymentCR", skip_serializing_if = "Option::is_none")]
    pub deployment_cr: Option<GitOpsDeployment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_deployment: Option<Deployment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector: Option<LabelSelector>,
    pub pod_log_access_enabled: bool,
    /// Explanation shown on the inert log control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_log_access_hint: Option<String>,
}
