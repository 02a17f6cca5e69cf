use buildwatch_model::{data::Commit, labels, resources::PipelineRun};

use crate::context::WorkspaceContext;

fn owned(value: Option<&str>) -> Option<String> {
    value.filter(|value| !value.is_empty()).map(ToString::to_string)
}

/// The SHA of the commit a pipeline run was triggered by.
pub fn commit_sha(run: &PipelineRun) -> Option<String> {
    owned(run.label(labels::COMMIT_LABEL)).or_else(|| owned(run.annotation(labels::COMMIT_ANNOTATION)))
}

/// Extract the commit which triggered a pipeline run.
///
/// Returns `None` if the run doesn't carry a commit SHA.
pub fn commit_of(run: &PipelineRun, context: &WorkspaceContext) -> Option<Commit> {
    let sha = commit_sha(run)?;
    let application = owned(run.label(labels::APPLICATION));

    let link = application.as_ref().map(|application| {
        format!(
            "/application-pipeline/workspaces/{}/applications/{application}/commit/{sha}",
            context.workspace
        )
    });

    Some(Commit {
        title: owned(run.annotation(labels::COMMIT_TITLE_ANNOTATION)),
        url: owned(run.annotation(labels::COMMIT_URL_ANNOTATION)),
        git_provider: owned(run.label(labels::COMMIT_PROVIDER_LABEL)),
        component: owned(run.label(labels::COMPONENT)),
        sender: owned(run.label(labels::COMMIT_USER_LABEL)),
        repository_url: owned(run.label(labels::COMMIT_REPO_URL_LABEL)),
        repository_org: owned(run.label(labels::COMMIT_REPO_ORG_LABEL)),
        branch: owned(run.annotation(labels::COMMIT_BRANCH_ANNOTATION)),
        event_type: owned(run.label(labels::COMMIT_EVENT_TYPE_LABEL)),
        pull_request_number: owned(run.label(labels::PULL_REQUEST_NUMBER_LABEL)),
        application,
        link,
        sha,
    })
}
