//! Joins the independently watched collections into the view of a single component.

pub mod build;
pub mod commit;
pub mod deployment;
pub mod scan;

use std::{collections::BTreeMap, sync::Arc};

use buildwatch_model::{
    data::{BuildDetails, ComponentView, Input, LatestBuild},
    labels,
    resources::{Component, Deployment, Environment, GitOpsDeployment, PipelineRun, SnapshotEnvironmentBinding, TaskRun},
};
use kube::ResourceExt;

use crate::{
    context::WorkspaceContext,
    view::{evaluate, Phase, Readiness},
    watch::Collection,
};

use self::deployment::RowPlan;

const BUILD_ERROR_TITLE: &str = "Unable to load the latest build information.";

/// The current state of all inputs of a component view.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub component: Collection<Component>,
    pub pipeline_runs: Collection<PipelineRun>,
    pub task_runs: Collection<TaskRun>,
    /// Test pipeline runs of the application.
    pub test_runs: Collection<PipelineRun>,
    pub bindings: Collection<SnapshotEnvironmentBinding>,
    pub deployment_crs: Collection<GitOpsDeployment>,
    pub environments: Collection<Environment>,
    /// Live deployments, by row key.
    pub deployments: BTreeMap<String, Collection<Deployment>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            component: Collection::loading(),
            pipeline_runs: Collection::loading(),
            task_runs: Collection::withheld(),
            test_runs: Collection::withheld(),
            bindings: Collection::withheld(),
            deployment_crs: Collection::loading(),
            environments: Collection::loading(),
            deployments: Default::default(),
        }
    }
}

/// Identifies the state of a snapshot, without comparing its content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revisions {
    inputs: [u64; 7],
    deployments: Vec<(String, u64)>,
}

impl Snapshot {
    pub fn revisions(&self) -> Revisions {
        Revisions {
            inputs: [
                self.component.revision,
                self.pipeline_runs.revision,
                self.task_runs.revision,
                self.test_runs.revision,
                self.bindings.revision,
                self.deployment_crs.revision,
                self.environments.revision,
            ],
            deployments: self
                .deployments
                .iter()
                .map(|(key, live)| (key.clone(), live.revision))
                .collect(),
        }
    }

    /// The latest successful build of the component.
    pub fn latest_build(&self, component: &str) -> Option<&PipelineRun> {
        build::latest_successful_build(self.pipeline_runs.items(), component)
    }

    /// The deployment rows of the component, for the application of its latest build.
    pub fn rows(&self, component: &str, application: &str) -> Vec<RowPlan> {
        deployment::plan_rows(
            component,
            application,
            self.bindings.items(),
            self.deployment_crs.items(),
            self.environments.items(),
        )
    }

    fn pending(&self) -> Vec<Input> {
        [
            (Input::Component, self.component.is_loaded()),
            (Input::TaskRuns, self.task_runs.is_loaded()),
            (Input::TestPipelineRuns, self.test_runs.is_loaded()),
            (Input::SnapshotEnvironmentBindings, self.bindings.is_loaded()),
            (Input::GitOpsDeployments, self.deployment_crs.is_loaded()),
            (Input::Environments, self.environments.is_loaded()),
        ]
        .into_iter()
        .filter_map(|(input, loaded)| (!loaded).then_some(input))
        .collect()
    }
}

/// The application a build belongs to, gating the binding query.
pub fn application_of(run: &PipelineRun) -> Option<&str> {
    run.label(labels::APPLICATION).filter(|application| !application.is_empty())
}

/// Derive the view of a component from the current snapshot.
pub fn derive(context: &WorkspaceContext, component: &str, snapshot: &Snapshot) -> ComponentView {
    let latest = snapshot.latest_build(component);

    let container_image = snapshot
        .component
        .single()
        .and_then(Component::container_image)
        .map(ToString::to_string);

    let mut view = ComponentView {
        component: component.to_string(),
        namespace: context.namespace.clone(),
        sbom_command: container_image
            .as_ref()
            .map(|image| format!("cosign download sbom {image}")),
        container_image,
        latest_build: LatestBuild::Loading,
        deployments: vec![],
    };

    let run = match (evaluate([&snapshot.pipeline_runs as &dyn Readiness], latest.is_some()), latest) {
        (Phase::Error(err), _) => {
            view.latest_build = LatestBuild::Error(err.to_info(BUILD_ERROR_TITLE));
            return view;
        }
        (Phase::Loading, _) => return view,
        (Phase::Empty, _) | (Phase::Ready, None) => {
            view.latest_build = LatestBuild::Empty;
            return view;
        }
        (Phase::Ready, Some(run)) => run,
    };

    let task_runs = build::task_runs_of(snapshot.task_runs.items(), &run.name_any());
    let withheld = Collection::withheld();

    view.deployments = application_of(run)
        .map(|application| snapshot.rows(component, application))
        .unwrap_or_default()
        .iter()
        .map(|plan| deployment::resolve_row(plan, snapshot.deployments.get(&plan.key).unwrap_or(&withheld)))
        .collect();

    view.latest_build = LatestBuild::Ready(Box::new(BuildDetails {
        pipeline_run: run.clone(),
        completion_time: run.completion_time().cloned(),
        commit: commit::commit_of(run, context),
        scan: scan::scan_summary(&task_runs),
        task_runs,
        test_runs: build::test_runs_of(snapshot.test_runs.items()),
        pending: snapshot.pending(),
    }));

    view
}

/// Derives views, handing out the previous instance while nothing changed.
pub struct Correlator {
    context: WorkspaceContext,
    component: String,
    last: Option<(Revisions, Arc<ComponentView>)>,
}

impl Correlator {
    pub fn new(context: WorkspaceContext, component: impl Into<String>) -> Self {
        Self {
            context,
            component: component.into(),
            last: None,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn context(&self) -> &WorkspaceContext {
        &self.context
    }

    pub fn view(&mut self, snapshot: &Snapshot) -> Arc<ComponentView> {
        let revisions = snapshot.revisions();

        if let Some((last_revisions, view)) = &self.last {
            if *last_revisions == revisions {
                return view.clone();
            }
        }

        let derived = derive(&self.context, &self.component, snapshot);
        let view = match self.last.take() {
            Some((_, last)) if *last == derived => last,
            _ => Arc::new(derived),
        };

        self.last = Some((revisions, view.clone()));
        view
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        correlate::{
            build::test::{pipeline_run, task_run, test_run},
            deployment::test::{binding, deployment, deployment_cr, environment},
        },
        error::TransportError,
    };
    use buildwatch_model::resources::{ComponentSpec, ComponentStatus};

    fn context() -> WorkspaceContext {
        WorkspaceContext::new("ns", "ws")
    }

    fn loaded_snapshot() -> Snapshot {
        let mut component = Component::new("frontend", ComponentSpec::default());
        component.status = Some(ComponentStatus {
            container_image: Some("quay.io/org/frontend@sha256:abc".into()),
        });

        Snapshot {
            component: Collection::ready(vec![component]),
            pipeline_runs: Collection::ready(vec![
                pipeline_run("build-1", "frontend", "True", Some(1)),
                pipeline_run("build-2", "frontend", "True", Some(2)),
            ]),
            task_runs: Collection::ready(vec![task_run("b", "build-2", 2), task_run("a", "build-2", 1)]),
            test_runs: Collection::ready(vec![test_run("e2e", "abc", "True", 3)]),
            bindings: Collection::ready(vec![
                binding("dev", "development", &["frontend"], "cr-dev"),
                binding("prod", "production", &["backend"], "cr-prod"),
            ]),
            deployment_crs: Collection::ready(vec![deployment_cr("cr-dev", "frontend")]),
            environments: Collection::ready(vec![environment("development", "Development")]),
            deployments: [(
                "uid-dev".to_string(),
                Collection::ready(vec![deployment("frontend", true)]),
            )]
            .into(),
        }
    }

    #[test]
    fn test_ready() {
        let view = derive(&context(), "frontend", &loaded_snapshot());

        assert_eq!(view.sbom_command.as_deref(), Some("cosign download sbom quay.io/org/frontend@sha256:abc"));

        let details = view.latest_build.details().expect("must be ready");
        assert_eq!(details.pipeline_run.name_any(), "build-2");
        let task_runs: Vec<_> = details.task_runs.iter().map(|t| t.name_any()).collect();
        assert_eq!(task_runs, vec!["a", "b"]);
        assert_eq!(details.test_runs.len(), 1);
        assert_eq!(details.test_runs[0].name, "e2e");
        assert!(details.pending.is_empty());

        assert_eq!(view.deployments.len(), 1);
        assert_eq!(view.deployments[0].environment_display_name, "Development");
        assert!(view.deployments[0].pod_log_access_enabled);
    }

    #[test]
    fn test_no_successful_build_is_empty() {
        let mut snapshot = loaded_snapshot();
        snapshot.pipeline_runs = Collection::ready(vec![pipeline_run("build-1", "frontend", "False", Some(1))]);

        let view = derive(&context(), "frontend", &snapshot);
        assert_eq!(view.latest_build, LatestBuild::Empty);
        assert!(view.deployments.is_empty());
    }

    #[test]
    fn test_transport_error() {
        let mut snapshot = loaded_snapshot();
        snapshot.pipeline_runs.error = Some(TransportError::new(403, "forbidden"));

        let view = derive(&context(), "frontend", &snapshot);
        match view.latest_build {
            LatestBuild::Error(info) => {
                assert_eq!(info.code, Some(403));
                assert_eq!(info.title, BUILD_ERROR_TITLE);
                assert_eq!(info.message, "Forbidden");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_loading() {
        let mut snapshot = loaded_snapshot();
        snapshot.pipeline_runs = Collection::loading();

        let view = derive(&context(), "frontend", &snapshot);
        assert_eq!(view.latest_build, LatestBuild::Loading);
    }

    #[test]
    fn test_secondary_inputs_best_effort() {
        let mut snapshot = loaded_snapshot();
        snapshot.task_runs = Collection::loading();
        snapshot.test_runs = Collection::loading();
        snapshot.environments = Collection::loading();

        let view = derive(&context(), "frontend", &snapshot);
        let details = view.latest_build.details().expect("must be ready");
        assert!(details.task_runs.is_empty());
        assert!(details.test_runs.is_empty());
        assert_eq!(
            details.pending,
            vec![Input::TaskRuns, Input::TestPipelineRuns, Input::Environments]
        );

        // display name falls back to the environment name
        assert_eq!(view.deployments[0].environment_display_name, "development");
    }

    #[test]
    fn test_unmatched_deployment_cr() {
        let mut snapshot = loaded_snapshot();
        snapshot.bindings = Collection::ready(vec![
            binding("dev", "development", &["frontend"], "cr-dev"),
            binding("dev2", "development", &["frontend"], "cr-missing"),
        ]);

        let view = derive(&context(), "frontend", &snapshot);
        assert_eq!(view.deployments.len(), 2);

        let missing = &view.deployments[1];
        assert_eq!(missing.key, "uid-dev2");
        assert_eq!(missing.deployment_cr, None);
        assert!(!missing.pod_log_access_enabled);

        let matched = &view.deployments[0];
        assert!(matched.deployment_cr.is_some());
        assert!(matched.pod_log_access_enabled);
    }

    #[test]
    fn test_referential_stability() {
        let snapshot = loaded_snapshot();
        let mut correlator = Correlator::new(context(), "frontend");

        let first = correlator.view(&snapshot);
        let second = correlator.view(&snapshot);
        assert!(Arc::ptr_eq(&first, &second));

        // new revision, same content
        let mut refreshed = snapshot.clone();
        refreshed.environments = Collection::ready(snapshot.environments.items().to_vec());
        let third = correlator.view(&refreshed);
        assert!(Arc::ptr_eq(&first, &third));

        // changed content
        refreshed.environments = Collection::ready(vec![environment("development", "Dev")]);
        let fourth = correlator.view(&refreshed);
        assert!(!Arc::ptr_eq(&first, &fourth));
        assert_eq!(fourth.deployments[0].environment_display_name, "Dev");
    }
}
