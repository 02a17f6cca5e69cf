use std::cmp::Ordering;

use buildwatch_model::{
    data::TestRun,
    labels,
    resources::{PipelineRun, RunStatus, TaskRun},
};
use kube::ResourceExt;

use crate::{
    selector::{Selector, SelectorError},
    watch::WatchRequest,
};

/// Selects the pipeline runs which build a component.
pub fn build_selector(component: &str) -> Result<Selector, SelectorError> {
    Selector::new([
        (labels::PIPELINE_TYPE, labels::PIPELINE_TYPE_BUILD),
        (labels::COMPONENT, component),
    ])
}

/// Selects the test pipeline runs of an application, optionally for a single commit.
pub fn test_selector(application: &str, commit: Option<&str>) -> Result<Selector, SelectorError> {
    Selector::new([
        (labels::PIPELINE_TYPE, labels::PIPELINE_TYPE_TEST),
        (labels::TEST_SERVICE_APPLICATION, application),
    ])?
    .with_optional(labels::COMMIT_LABEL, commit)
}

/// Selects the test pipeline runs of an application.
pub fn test_runs_request(namespace: &str, application: &str, commit: Option<&str>) -> Option<WatchRequest> {
    match test_selector(application, commit) {
        Ok(selector) => Some(WatchRequest::list(namespace).with_selector(selector)),
        Err(err) => {
            log::warn!("Unable to select test pipelines of {application}: {err}");
            None
        }
    }
}

/// Selects the task runs of a pipeline run.
pub fn task_runs_request(namespace: &str, pipeline_run: &str) -> Option<WatchRequest> {
    match Selector::new([(labels::TASK_RUN_PIPELINE_RUN, pipeline_run)]) {
        Ok(selector) => Some(WatchRequest::list(namespace).with_selector(selector)),
        Err(err) => {
            log::warn!("Unable to select task runs of {pipeline_run}: {err}");
            None
        }
    }
}

fn is_successful_build(run: &PipelineRun, component: &str) -> bool {
    run.label(labels::PIPELINE_TYPE) == Some(labels::PIPELINE_TYPE_BUILD)
        && run.label(labels::COMPONENT) == Some(component)
        && run.run_status() == RunStatus::Succeeded
}

/// Order by completion time, then by name.
fn by_completion(a: &PipelineRun, b: &PipelineRun) -> Ordering {
    a.completion_time()
        .map(|time| time.0)
        .cmp(&b.completion_time().map(|time| time.0))
        .then_with(|| a.name_any().cmp(&b.name_any()))
}

/// Find the latest successful build of a component.
///
/// Runs which completed at the same time are ordered by name, the greatest name wins. This way
/// the selection does not depend on the order of the input.
pub fn latest_successful_build<'a>(runs: &'a [PipelineRun], component: &str) -> Option<&'a PipelineRun> {
    runs.iter()
        .filter(|run| is_successful_build(run, component))
        .max_by(|a, b| by_completion(a, b))
}

/// Task runs of a pipeline run, in the order they started.
pub fn task_runs_of(task_runs: &[TaskRun], pipeline_run: &str) -> Vec<TaskRun> {
    let mut result: Vec<_> = task_runs
        .iter()
        .filter(|task_run| task_run.pipeline_run() == Some(pipeline_run))
        .cloned()
        .collect();

    result.sort_by(|a, b| {
        a.start_time()
            .map(|time| time.0)
            .cmp(&b.start_time().map(|time| time.0))
            .then_with(|| a.name_any().cmp(&b.name_any()))
    });

    result
}

/// Test pipeline runs, in the order they started.
pub fn test_runs_of(runs: &[PipelineRun]) -> Vec<TestRun> {
    let mut runs: Vec<_> = runs
        .iter()
        .filter(|run| run.label(labels::PIPELINE_TYPE) == Some(labels::PIPELINE_TYPE_TEST))
        .collect();

    runs.sort_by(|a, b| {
        a.start_time()
            .map(|time| time.0)
            .cmp(&b.start_time().map(|time| time.0))
            .then_with(|| a.name_any().cmp(&b.name_any()))
    });

    runs.into_iter()
        .map(|run| TestRun {
            name: run.name_any(),
            status: run.run_status(),
            start_time: run.start_time().cloned(),
            completion_time: run.completion_time().cloned(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use buildwatch_model::resources::{Condition, PipelineRunSpec, PipelineRunStatus, TaskRunSpec, TaskRunStatus};
    use chrono::{TimeZone, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    pub fn time(minute: u32) -> Time {
        Time(Utc.with_ymd_and_hms(2023, 6, 1, 12, minute, 0).unwrap())
    }

    pub fn pipeline_run(name: &str, component: &str, status: &str, completed: Option<u32>) -> PipelineRun {
        let mut run = PipelineRun::new(name, PipelineRunSpec::default());
        run.metadata.namespace = Some("ns".into());
        let run_labels = run.labels_mut();
        run_labels.insert(labels::PIPELINE_TYPE.into(), labels::PIPELINE_TYPE_BUILD.into());
        run_labels.insert(labels::COMPONENT.into(), component.into());
        run_labels.insert(labels::APPLICATION.into(), "app".into());
        run.status = Some(PipelineRunStatus {
            conditions: vec![Condition {
                r#type: "Succeeded".into(),
                status: status.into(),
                ..Default::default()
            }],
            start_time: None,
            completion_time: completed.map(time),
        });
        run
    }

    pub fn test_run(name: &str, commit: &str, status: &str, started: u32) -> PipelineRun {
        let mut run = PipelineRun::new(name, PipelineRunSpec::default());
        run.metadata.namespace = Some("ns".into());
        let run_labels = run.labels_mut();
        run_labels.insert(labels::PIPELINE_TYPE.into(), labels::PIPELINE_TYPE_TEST.into());
        run_labels.insert(labels::TEST_SERVICE_APPLICATION.into(), "app".into());
        run_labels.insert(labels::COMMIT_LABEL.into(), commit.into());
        run.status = Some(PipelineRunStatus {
            conditions: vec![Condition {
                r#type: "Succeeded".into(),
                status: status.into(),
                ..Default::default()
            }],
            start_time: Some(time(started)),
            completion_time: None,
        });
        run
    }

    pub fn task_run(name: &str, pipeline_run: &str, started: u32) -> TaskRun {
        let mut run = TaskRun::new(name, TaskRunSpec {});
        run.metadata.namespace = Some("ns".into());
        run.labels_mut()
            .insert(labels::TASK_RUN_PIPELINE_RUN.into(), pipeline_run.into());
        run.status = Some(TaskRunStatus {
            start_time: Some(time(started)),
            ..Default::default()
        });
        run
    }

    #[test]
    fn test_latest_wins() {
        let runs = vec![
            pipeline_run("build-1", "frontend", "True", Some(1)),
            pipeline_run("build-2", "frontend", "True", Some(2)),
        ];
        assert_eq!(
            latest_successful_build(&runs, "frontend").map(|r| r.name_any()),
            Some("build-2".into())
        );
    }

    #[test]
    fn test_only_successful_builds_of_component() {
        let runs = vec![
            pipeline_run("build-1", "frontend", "True", Some(1)),
            pipeline_run("build-2", "frontend", "False", Some(5)),
            pipeline_run("build-3", "frontend", "Unknown", None),
            pipeline_run("build-4", "backend", "True", Some(9)),
        ];
        assert_eq!(
            latest_successful_build(&runs, "frontend").map(|r| r.name_any()),
            Some("build-1".into())
        );
    }

    #[test]
    fn test_test_pipelines_are_not_builds() {
        let mut run = pipeline_run("test-1", "frontend", "True", Some(1));
        run.labels_mut()
            .insert(labels::PIPELINE_TYPE.into(), labels::PIPELINE_TYPE_TEST.into());
        assert!(latest_successful_build(&[run], "frontend").is_none());
    }

    #[test]
    fn test_none_qualify() {
        let runs = vec![pipeline_run("build-1", "frontend", "False", Some(1))];
        assert!(latest_successful_build(&runs, "frontend").is_none());
        assert!(latest_successful_build(&[], "frontend").is_none());
    }

    #[test]
    fn test_equal_timestamps_deterministic() {
        let a = pipeline_run("build-a", "frontend", "True", Some(3));
        let b = pipeline_run("build-b", "frontend", "True", Some(3));

        let forward = vec![a.clone(), b.clone()];
        let backward = vec![b, a];

        for _ in 0..3 {
            assert_eq!(
                latest_successful_build(&forward, "frontend").map(|r| r.name_any()),
                Some("build-b".into())
            );
            assert_eq!(
                latest_successful_build(&backward, "frontend").map(|r| r.name_any()),
                Some("build-b".into())
            );
        }
    }

    #[test]
    fn test_task_runs_ordered() {
        let task_runs = vec![
            task_run("scan", "build-1", 5),
            task_run("clone", "build-1", 1),
            task_run("other", "build-2", 0),
            task_run("build", "build-1", 1),
        ];
        let names: Vec<_> = task_runs_of(&task_runs, "build-1")
            .iter()
            .map(|t| t.name_any())
            .collect();
        assert_eq!(names, vec!["build", "clone", "scan"]);
    }

    #[test]
    fn test_test_selector() {
        let selector = test_selector("app", Some("abc")).unwrap();
        assert_eq!(
            selector.to_string(),
            "pipelines.appstudio.openshift.io/type=test,\
             pipelinesascode.tekton.dev/sha=abc,\
             test.appstudio.openshift.io/application=app"
        );

        let selector = test_selector("app", None).unwrap();
        assert_eq!(selector.iter().count(), 2);
    }

    #[test]
    fn test_test_runs_request() {
        let request = test_runs_request("ns", "app", Some("abc")).unwrap();
        assert_eq!(request.namespace, "ns");
        assert!(request.is_list());
        assert_eq!(request.selector, Some(test_selector("app", Some("abc")).unwrap()));

        assert!(test_runs_request("ns", "not an application", None).is_none());
    }

    #[test]
    fn test_test_runs_ordered() {
        let mut build = pipeline_run("build-1", "frontend", "True", Some(0));
        build.labels_mut().insert(labels::COMMIT_LABEL.into(), "abc".into());

        let runs = vec![
            test_run("e2e", "abc", "Unknown", 4),
            build,
            test_run("contract", "abc", "False", 2),
            test_run("unit", "abc", "True", 2),
        ];

        let test_runs = test_runs_of(&runs);
        let names: Vec<_> = test_runs.iter().map(|run| run.name.as_str()).collect();
        assert_eq!(names, vec!["contract", "unit", "e2e"]);

        let statuses: Vec<_> = test_runs.iter().map(|run| run.status).collect();
        assert_eq!(statuses, vec![RunStatus::Failed, RunStatus::Succeeded, RunStatus::Running]);
        assert_eq!(test_runs[2].start_time, Some(time(4)));
    }
}
