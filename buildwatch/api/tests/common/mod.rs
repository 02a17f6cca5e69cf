//! Cluster objects, the way the API server returns them.

#![allow(dead_code)]

use buildwatch_api::watch::MemoryWatcher;
use buildwatch_model::resources::{
    Component, Deployment, Environment, GitOpsDeployment, PipelineRun, SnapshotEnvironmentBinding, TaskRun,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub const NAMESPACE: &str = "team-a";
pub const DEPLOY_NAMESPACE: &str = "team-a-development";

fn parse<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("valid fixture")
}

pub fn component(name: &str, image: &str) -> Component {
    parse(json!({
        "apiVersion": "appstudio.redhat.com/v1alpha1",
        "kind": "Component",
        "metadata": { "name": name, "namespace": NAMESPACE },
        "spec": { "componentName": name, "application": "shop" },
        "status": { "containerImage": image },
    }))
}

pub fn build(name: &str, component: &str, status: &str, completed: &str, sha: &str) -> PipelineRun {
    parse(json!({
        "apiVersion": "tekton.dev/v1beta1",
        "kind": "PipelineRun",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "labels": {
                "pipelines.appstudio.openshift.io/type": "build",
                "appstudio.openshift.io/component": component,
                "appstudio.openshift.io/application": "shop",
                "pipelinesascode.tekton.dev/sha": sha,
                "pipelinesascode.tekton.dev/git-provider": "github",
                "pipelinesascode.tekton.dev/event-type": "push",
            },
            "annotations": {
                "pipelinesascode.tekton.dev/sha-title": "Update the cart",
            },
        },
        "spec": {},
        "status": {
            "conditions": [{ "type": "Succeeded", "status": status }],
            "startTime": "2023-06-01T12:00:00Z",
            "completionTime": completed,
        },
    }))
}

pub fn test_pipeline(name: &str, status: &str, started: &str, sha: &str) -> PipelineRun {
    parse(json!({
        "apiVersion": "tekton.dev/v1beta1",
        "kind": "PipelineRun",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "labels": {
                "pipelines.appstudio.openshift.io/type": "test",
                "test.appstudio.openshift.io/application": "shop",
                "pipelinesascode.tekton.dev/sha": sha,
            },
        },
        "spec": {},
        "status": {
            "conditions": [{ "type": "Succeeded", "status": status }],
            "startTime": started,
        },
    }))
}

pub fn task_run(name: &str, pipeline_run: &str, started: &str, results: Value) -> TaskRun {
    parse(json!({
        "apiVersion": "tekton.dev/v1beta1",
        "kind": "TaskRun",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "labels": { "tekton.dev/pipelineRun": pipeline_run },
        },
        "spec": {},
        "status": {
            "startTime": started,
            "taskResults": results,
        },
    }))
}

pub fn binding(name: &str, environment: &str, deployment_cr: &str) -> SnapshotEnvironmentBinding {
    parse(json!({
        "apiVersion": "appstudio.redhat.com/v1alpha1",
        "kind": "SnapshotEnvironmentBinding",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "uid": format!("uid-{name}"),
            "labels": { "appstudio.environment": environment },
        },
        "spec": {
            "application": "shop",
            "environment": environment,
            "snapshot": "shop-snapshot-1",
            "components": [{ "name": "cart" }],
        },
        "status": {
            "gitopsDeployments": [{ "componentName": "cart", "gitopsDeployment": deployment_cr }],
        },
    }))
}

pub fn deployment_cr(name: &str, deployment: &str) -> GitOpsDeployment {
    parse(json!({
        "apiVersion": "managed-gitops.redhat.com/v1alpha1",
        "kind": "GitOpsDeployment",
        "metadata": { "name": name, "namespace": NAMESPACE },
        "spec": {
            "source": { "repoURL": "https://example.com/gitops", "path": "components/cart" },
            "type": "automated",
        },
        "status": {
            "resources": [
                { "kind": "Service", "name": deployment, "namespace": DEPLOY_NAMESPACE },
                { "group": "apps", "kind": "Deployment", "name": deployment, "namespace": DEPLOY_NAMESPACE },
            ],
        },
    }))
}

pub fn environment(name: &str, display_name: &str) -> Environment {
    parse(json!({
        "apiVersion": "appstudio.redhat.com/v1alpha1",
        "kind": "Environment",
        "metadata": { "name": name, "namespace": NAMESPACE },
        "spec": { "displayName": display_name, "deploymentStrategy": "AppStudioAutomated" },
    }))
}

pub fn deployment(name: &str) -> Deployment {
    parse(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": name, "namespace": DEPLOY_NAMESPACE },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": { "metadata": { "labels": { "app": name } } },
        },
    }))
}

/// A component with a successful build, deployed to the development environment.
pub fn seeded() -> MemoryWatcher {
    let memory = MemoryWatcher::new();

    memory.restart(NAMESPACE, [component("cart", "quay.io/shop/cart@sha256:1234")]);
    memory.restart(
        NAMESPACE,
        [
            build("cart-on-push-1", "cart", "True", "2023-06-01T12:10:00Z", "aaa111"),
            build("cart-on-push-2", "cart", "True", "2023-06-01T12:20:00Z", "bbb222"),
            build("cart-on-push-3", "cart", "False", "2023-06-01T12:30:00Z", "ccc333"),
            build("checkout-on-push-1", "checkout", "True", "2023-06-01T12:40:00Z", "ddd444"),
            test_pipeline("shop-e2e-1", "False", "2023-06-01T12:12:00Z", "aaa111"),
            test_pipeline("shop-e2e-2", "True", "2023-06-01T12:22:00Z", "bbb222"),
        ],
    );
    memory.restart(
        NAMESPACE,
        [
            task_run("cart-on-push-2-clone", "cart-on-push-2", "2023-06-01T12:11:00Z", json!([])),
            task_run(
                "cart-on-push-2-clair-scan",
                "cart-on-push-2",
                "2023-06-01T12:15:00Z",
                json!([{
                    "name": "CLAIR_SCAN_RESULT",
                    "value": r#"{"vulnerabilities":{"critical":0,"high":2,"medium":5,"low":9}}"#,
                }]),
            ),
            task_run("cart-on-push-1-clone", "cart-on-push-1", "2023-06-01T12:01:00Z", json!([])),
        ],
    );
    memory.restart(NAMESPACE, [binding("shop-development", "development", "cart-deployment")]);
    memory.restart(NAMESPACE, [deployment_cr("cart-deployment", "cart")]);
    memory.restart(NAMESPACE, [environment("development", "Development")]);
    memory.restart(DEPLOY_NAMESPACE, [deployment("cart")]);

    memory
}
