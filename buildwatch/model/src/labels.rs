//! Well-known label and annotation keys.

/// The component a pipeline run was built for.
pub const COMPONENT: &str = "appstudio.openshift.io/component";
/// The application a pipeline run or binding belongs to.
pub const APPLICATION: &str = "appstudio.openshift.io/application";
/// The kind of pipeline (`build`, `test`).
pub const PIPELINE_TYPE: &str = "pipelines.appstudio.openshift.io/type";

pub const PIPELINE_TYPE_BUILD: &str = "build";
pub const PIPELINE_TYPE_TEST: &str = "test";

pub const COMMIT_LABEL: &str = "pipelinesascode.tekton.dev/sha";
pub const COMMIT_ANNOTATION: &str = "build.appstudio.redhat.com/commit_sha";
pub const COMMIT_TITLE_ANNOTATION: &str = "pipelinesascode.tekton.dev/sha-title";
pub const COMMIT_URL_ANNOTATION: &str = "pipelinesascode.tekton.dev/sha-url";
pub const COMMIT_PROVIDER_LABEL: &str = "pipelinesascode.tekton.dev/git-provider";
pub const COMMIT_USER_LABEL: &str = "pipelinesascode.tekton.dev/sender";
pub const COMMIT_REPO_URL_LABEL: &str = "pipelinesascode.tekton.dev/url-repository";
pub const COMMIT_REPO_ORG_LABEL: &str = "pipelinesascode.tekton.dev/url-org";
pub const COMMIT_BRANCH_ANNOTATION: &str = "build.appstudio.redhat.com/target_branch";
pub const COMMIT_EVENT_TYPE_LABEL: &str = "pipelinesascode.tekton.dev/event-type";
pub const PULL_REQUEST_NUMBER_LABEL: &str = "pipelinesascode.tekton.dev/pull-request";

pub const TEST_SERVICE_APPLICATION: &str = "test.appstudio.openshift.io/application";

/// The pipeline run owning a task run.
pub const TASK_RUN_PIPELINE_RUN: &str = "tekton.dev/pipelineRun";

/// The target environment of a snapshot environment binding.
pub const ENVIRONMENT: &str = "appstudio.environment";

/// The environment in which pod logs may be viewed.
pub const DEVELOPMENT_ENVIRONMENT: &str = "development";
