// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for secrets-injector-webhook.
//!
//! These tests drive the public evaluator API with AdmissionRequests shaped
//! like the ones the API server sends, and apply returned patches to prove
//! they are valid against the submitted pod.

use std::sync::Arc;

use serde_json::{Value, json};

use secrets_injector_webhook::webhooks::review::{AdmissionRequest, GroupVersionResource};
use secrets_injector_webhook::webhooks::{AdmissionResponse, MutationStrategy};
use secrets_injector_webhook::{AdmissionEvaluator, InjectorConfig, MountStrategy, PathMode};

const UID: &str = "705ab4f5-6393-11e8-b7cc-42010a800002";

fn pod_request(object: Value) -> AdmissionRequest {
    AdmissionRequest {
        uid: UID.to_string(),
        resource: GroupVersionResource::pods(),
        operation: "CREATE".to_string(),
        namespace: Some("default".to_string()),
        object: Some(object),
        ..Default::default()
    }
}

fn pod_json(annotations: Value, containers: &[&str]) -> Value {
    let containers: Vec<Value> = containers
        .iter()
        .map(|name| json!({"name": name, "image": "busybox"}))
        .collect();
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "web", "namespace": "default", "annotations": annotations},
        "spec": {"containers": containers}
    })
}

fn evaluator(config: InjectorConfig) -> AdmissionEvaluator {
    AdmissionEvaluator::new(Arc::new(config))
}

fn injector() -> AdmissionEvaluator {
    evaluator(
        InjectorConfig::new()
            .with_sidecar_image("sidecar:1.0")
            .with_init_image("secrets-fetcher:1.0")
            .with_annotation_prefix("secrets.example"),
    )
}

fn operations(response: &AdmissionResponse) -> Vec<Value> {
    let value = response
        .patch_operations()
        .expect("response carries a patch")
        .expect("patch is valid JSON");
    value.as_array().expect("patch is a JSON array").clone()
}

/// Apply the response patch to `object`
fn apply(object: &Value, response: &AdmissionResponse) -> Value {
    let bytes = &response.patch.as_ref().expect("response carries a patch").0;
    let patch: json_patch::Patch = serde_json::from_slice(bytes).unwrap();
    let mut patched = object.clone();
    json_patch::patch(&mut patched, &patch.0).unwrap();
    patched
}

mod mutation_tests {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;

    #[test]
    fn test_single_secret_two_containers() {
        let object = pod_json(
            json!({"secrets.example/secret-arn": "arn:aws:secretsmanager:us-east-1:123:secret:db"}),
            &["app", "proxy"],
        );
        let resp = injector().evaluate_pod_mutation(
            &pod_request(object.clone()),
            MutationStrategy::AnnotationDriven,
        );
        assert!(resp.allowed);
        assert_eq!(resp.uid, UID);

        let ops = operations(&resp);
        assert!(ops.iter().all(|op| op["op"] == "add"));

        let init = ops.iter().find(|op| op["path"] == "/spec/initContainers").unwrap();
        let init = init["value"].as_array().unwrap();
        assert_eq!(init.len(), 1);
        assert_eq!(init[0]["name"], "secrets-init-container-0");
        assert_eq!(init[0]["image"], "secrets-fetcher:1.0");
        assert_eq!(
            init[0]["env"][0]["valueFrom"]["fieldRef"]["fieldPath"],
            "metadata.annotations['secrets.example/secret-arn']"
        );

        let volume = ops.iter().find(|op| op["path"] == "/spec/volumes").unwrap();
        assert_eq!(volume["value"][0]["name"], "secret-vol");
        assert_eq!(volume["value"][0]["emptyDir"]["medium"], "Memory");

        // Containers without volumeMounts get the array created
        let mounts: Vec<&Value> = ops
            .iter()
            .filter(|op| op["path"].as_str().unwrap().ends_with("/volumeMounts"))
            .collect();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0]["path"], "/spec/containers/0/volumeMounts");
        assert_eq!(mounts[1]["path"], "/spec/containers/1/volumeMounts");

        let path0 = mounts[0]["value"][0]["mountPath"].as_str().unwrap();
        let path1 = mounts[1]["value"][0]["mountPath"].as_str().unwrap();
        assert_eq!(path0, path1);
        assert!(path0.starts_with("/tmp/"));
        assert!(path0.len() > "/tmp/".len());
    }

    #[test]
    fn test_existing_mounts_appended() {
        let mut object = pod_json(json!({"secrets.example/db": "arn"}), &["app", "proxy"]);
        for container in object["spec"]["containers"].as_array_mut().unwrap() {
            container["volumeMounts"] = json!([{"name": "data", "mountPath": "/data"}]);
        }

        let resp = injector().evaluate_pod_mutation(
            &pod_request(object.clone()),
            MutationStrategy::AnnotationDriven,
        );
        let ops = operations(&resp);
        let appends: Vec<&Value> = ops
            .iter()
            .filter(|op| op["path"].as_str().unwrap().ends_with("/volumeMounts/-"))
            .collect();
        assert_eq!(appends.len(), 2);
        assert_eq!(appends[0]["value"]["mountPath"], appends[1]["value"]["mountPath"]);

        let patched = apply(&object, &resp);
        assert_eq!(patched["spec"]["containers"][0]["volumeMounts"][0]["name"], "data");
        assert_eq!(patched["spec"]["containers"][0]["volumeMounts"][1]["name"], "secret-vol");
    }

    #[test]
    fn test_mount_path_fresh_per_request() {
        let object = pod_json(json!({"secrets.example/db": "arn"}), &["app"]);
        let eval = injector();
        let mount_path = |resp: &AdmissionResponse| {
            operations(resp)
                .iter()
                .find(|op| op["path"] == "/spec/containers/0/volumeMounts")
                .map(|op| op["value"][0]["mountPath"].as_str().unwrap().to_string())
                .unwrap()
        };

        let first = eval.evaluate_pod_mutation(

            &pod_request(object.clone()),

            MutationStrategy::AnnotationDriven,

        );
        let second = eval.evaluate_pod_mutation(
            &pod_request(object),
            MutationStrategy::AnnotationDriven,
        );
        assert_ne!(mount_path(&first), mount_path(&second));
    }

    #[test]
    fn test_fixed_mount_path_without_env() {
        let eval = evaluator(
            InjectorConfig::new()
                .with_sidecar_image("sidecar:1.0")
                .with_mount_strategy(MountStrategy {
                    path_mode: PathMode::Fixed,
                    inject_env_var: false,
                }),
        );
        let object = pod_json(json!({"secrets.k8s.aws/db": "arn"}), &["app"]);

        let resp = eval.evaluate_pod_mutation(

            &pod_request(object),

            MutationStrategy::AnnotationDriven,

        );
        let ops = operations(&resp);
        assert!(ops.iter().all(|op| !op["path"].as_str().unwrap().contains("/env")));
        let mount = ops
            .iter()
            .find(|op| op["path"] == "/spec/containers/0/volumeMounts")
            .unwrap();
        assert_eq!(mount["value"][0]["mountPath"], "/tmp");

        // Init image falls back to the sidecar image
        let init = ops.iter().find(|op| op["path"] == "/spec/initContainers").unwrap();
        assert_eq!(init["value"][0]["image"], "sidecar:1.0");
    }

    #[test]
    fn test_location_env_matches_mount_path() {
        let object = pod_json(json!({"secrets.example/db": "arn"}), &["app"]);
        let resp = injector().evaluate_pod_mutation(
            &pod_request(object.clone()),
            MutationStrategy::AnnotationDriven,
        );
        let patched = apply(&object, &resp);

        let container = &patched["spec"]["containers"][0];
        assert_eq!(container["env"][0]["name"], "SEC_LOC");
        assert_eq!(container["env"][0]["value"], container["volumeMounts"][0]["mountPath"]);
    }

    #[test]
    fn test_init_containers_numbered_in_key_order() {
        let object = pod_json(
            json!({
                "secrets.example/zeta": "arn-z",
                "secrets.example/alpha": "arn-a",
                "secrets.example/sidecarInjectorWebhook": "enabled",
                "team": "payments"
            }),
            &["app"],
        );
        let resp = injector().evaluate_pod_mutation(
            &pod_request(object.clone()),
            MutationStrategy::AnnotationDriven,
        );
        let patched = apply(&object, &resp);

        let init = patched["spec"]["initContainers"].as_array().unwrap();
        assert_eq!(init.len(), 2);
        assert_eq!(init[0]["name"], "secrets-init-container-0");
        assert_eq!(
            init[0]["env"][0]["valueFrom"]["fieldRef"]["fieldPath"],
            "metadata.annotations['secrets.example/alpha']"
        );
        assert_eq!(init[1]["name"], "secrets-init-container-1");
    }

    #[test]
    fn test_existing_init_containers_kept() {
        let mut object = pod_json(json!({"secrets.example/db": "arn"}), &["app"]);
        object["spec"]["initContainers"] = json!([{"name": "migrate", "image": "migrate:1"}]);
        object["spec"]["volumes"] = json!([{"name": "data", "emptyDir": {}}]);

        let resp = injector().evaluate_pod_mutation(

            &pod_request(object.clone()),

            MutationStrategy::AnnotationDriven,

        );
        let patched = apply(&object, &resp);

        let init = patched["spec"]["initContainers"].as_array().unwrap();
        assert_eq!(init[0]["name"], "migrate");
        assert_eq!(init[1]["name"], "secrets-init-container-0");
        let volumes = patched["spec"]["volumes"].as_array().unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[1]["name"], "secret-vol");
    }

    #[test]
    fn test_toggle_annotation_alone_not_patched() {
        let object = pod_json(
            json!({"secrets.example/sidecarInjectorWebhook": "enabled"}),
            &["app"],
        );
        let resp = injector().evaluate_pod_mutation(
            &pod_request(object),
            MutationStrategy::AnnotationDriven,
        );
        assert!(resp.allowed);
        assert!(resp.patch.is_none());
        assert!(resp.patch_type.is_none());
    }

    #[test]
    fn test_should_patch_toggle_only() {
        let pod: Pod = serde_json::from_value(pod_json(
            json!({"secrets.example/sidecarInjectorWebhook": "enabled"}),
            &["app"],
        ))
        .unwrap();
        assert!(!injector().should_patch(&pod, MutationStrategy::AnnotationDriven));
    }

    #[test]
    fn test_annotation_driven_idempotent() {
        let object = pod_json(json!({"secrets.example/db": "arn"}), &["app", "proxy"]);
        let eval = injector();

        let first = eval.evaluate_pod_mutation(

            &pod_request(object.clone()),

            MutationStrategy::AnnotationDriven,

        );
        let patched = apply(&object, &first);

        let second = eval.evaluate_pod_mutation(

            &pod_request(patched),

            MutationStrategy::AnnotationDriven,

        );
        assert!(second.allowed);
        assert!(second.patch.is_none());
    }

    #[test]
    fn test_sidecar_idempotent() {
        let object = pod_json(json!({}), &["app"]);
        let eval = injector();

        let first = eval.evaluate_pod_mutation(

            &pod_request(object.clone()),

            MutationStrategy::SidecarOnly,

        );
        let patched = apply(&object, &first);
        let containers = patched["spec"]["containers"].as_array().unwrap();
        assert_eq!(containers[1]["name"], "webhook-added-sidecar");
        assert_eq!(containers[1]["image"], "sidecar:1.0");
        assert_eq!(patched["spec"]["volumes"][0]["name"], "vol");

        let second = eval.evaluate_pod_mutation(

            &pod_request(patched),

            MutationStrategy::SidecarOnly,

        );
        assert!(second.allowed);
        assert!(second.patch.is_none());
    }

    #[test]
    fn test_sidecar_without_image_fails_closed() {
        let eval = evaluator(InjectorConfig::new());
        // Undecodable payload: the image check must come first
        let resp = eval.evaluate_pod_mutation(
            &pod_request(json!([1, 2, 3])),
            MutationStrategy::SidecarOnly,
        );
        assert!(!resp.allowed);
        let status = resp.status.unwrap();
        assert_eq!(status.code, 500);
        assert_eq!(status.status, "Failure");
        assert_eq!(status.message, "No image specified by the sidecar-image parameter");
    }

    #[test]
    fn test_wrong_resource_rejected() {
        let mut req = pod_request(pod_json(json!({"secrets.example/db": "arn"}), &["app"]));
        req.resource = GroupVersionResource {
            group: "apps".to_string(),
            version: "v1".to_string(),
            resource: "deployments".to_string(),
        };
        let resp = injector().evaluate_pod_mutation(&req, MutationStrategy::AnnotationDriven);
        assert!(!resp.allowed);
        assert_eq!(resp.status.unwrap().code, 400);
    }

    #[test]
    fn test_undecodable_pod_rejected() {
        let req = pod_request(json!({"spec": {"containers": "not-a-list"}}));
        let resp = injector().evaluate_pod_mutation(&req, MutationStrategy::AnnotationDriven);
        assert!(!resp.allowed);
        assert_eq!(resp.reason(), Some("DecodeError"));
        assert_eq!(resp.status.unwrap().code, 400);
    }
}

mod admission_tests {
    use super::*;

    fn labeled_pod(labels: Value, containers: &[&str]) -> Value {
        let mut pod = pod_json(json!({}), containers);
        pod["metadata"]["labels"] = labels;
        pod
    }

    #[tokio::test]
    async fn test_unwanted_label_denied() {
        let req = pod_request(labeled_pod(
            json!({"webhook-e2e-test": "webhook-disallow"}),
            &["app"],
        ));
        let resp = injector().evaluate_pod_admission(&req).await;
        assert!(!resp.allowed);
        assert!(resp.message().unwrap().contains("unwanted label"));
    }

    #[tokio::test]
    async fn test_unwanted_container_name_denied() {
        let req = pod_request(labeled_pod(json!({}), &["app", "webhook-disallow-sidecar"]));
        let resp = injector().evaluate_pod_admission(&req).await;
        assert!(!resp.allowed);
        assert!(resp.message().unwrap().contains("unwanted container name"));
    }

    #[tokio::test]
    async fn test_clean_pod_allowed() {
        let req = pod_request(labeled_pod(json!({"app": "web"}), &["app"]));
        let resp = injector().evaluate_pod_admission(&req).await;
        assert!(resp.allowed);
        assert!(resp.status.is_none());
    }

    #[tokio::test]
    async fn test_violations_concatenated() {
        let req = pod_request(labeled_pod(
            json!({"webhook-e2e-test": "webhook-disallow"}),
            &["webhook-disallow-sidecar"],
        ));
        let resp = injector().evaluate_pod_admission(&req).await;
        let message = resp.message().unwrap();
        assert!(message.contains("unwanted label; "));
        assert!(message.contains("unwanted container name"));
        assert_eq!(message, message.trim());
    }

    #[tokio::test]
    async fn test_missing_object_rejected() {
        let mut req = pod_request(json!({}));
        req.object = None;
        let resp = injector().evaluate_pod_admission(&req).await;
        assert!(!resp.allowed);
        assert_eq!(resp.status.unwrap().code, 400);
    }
}

mod attach_tests {
    use super::*;

    const SENTINEL_POD: &str = "to-be-attached-pod";
    const SENTINEL_CONTAINER: &str = "container1";

    fn attach_request(
        name: &str,
        sub_resource: Option<&str>,
        container: &str,
        stdin: bool,
    ) -> AdmissionRequest {
        AdmissionRequest {
            uid: UID.to_string(),
            resource: GroupVersionResource::pods(),
            sub_resource: sub_resource.map(String::from),
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            operation: "CONNECT".to_string(),
            object: Some(json!({
                "kind": "PodAttachOptions",
                "apiVersion": "v1",
                "container": container,
                "stdin": stdin
            })),
            ..Default::default()
        }
    }

    #[test]
    fn test_sentinel_combination_denied() {
        let req = attach_request(SENTINEL_POD, Some("attach"), SENTINEL_CONTAINER, true);
        let resp = injector().evaluate_pod_attach_admission(&req);
        assert!(!resp.allowed);
        assert_eq!(
            resp.message(),
            Some("attaching to pod 'to-be-attached-pod' is not allowed")
        );
    }

    #[test]
    fn test_every_other_combination_allowed() {
        let eval = injector();
        for name in [SENTINEL_POD, "other-pod"] {
            for sub_resource in [Some("attach"), Some("exec"), None] {
                for container in [SENTINEL_CONTAINER, "container2"] {
                    for stdin in [true, false] {
                        if name == SENTINEL_POD
                            && sub_resource == Some("attach")
                            && container == SENTINEL_CONTAINER
                            && stdin
                        {
                            continue;
                        }
                        let req = attach_request(name, sub_resource, container, stdin);
                        let resp = eval.evaluate_pod_attach_admission(&req);
                        assert!(
                            resp.allowed,
                            "{} {:?} {} {} should be allowed",
                            name, sub_resource, container, stdin
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_other_pod_skips_validation() {
        let mut req = attach_request("other-pod", Some("attach"), SENTINEL_CONTAINER, true);
        req.object = Some(json!("garbage"));
        assert!(injector().evaluate_pod_attach_admission(&req).allowed);
    }

    #[test]
    fn test_bad_attach_options_rejected() {
        let mut req = attach_request(SENTINEL_POD, Some("attach"), SENTINEL_CONTAINER, true);
        req.object = Some(json!({"stdin": "yes"}));
        let resp = injector().evaluate_pod_attach_admission(&req);
        assert!(!resp.allowed);
        assert_eq!(resp.reason(), Some("DecodeError"));
    }

    #[test]
    fn test_sentinel_without_subresource_allowed() {
        let req = attach_request(SENTINEL_POD, None, SENTINEL_CONTAINER, true);
        let resp = injector().evaluate_pod_attach_admission(&req);
        assert!(resp.allowed);
        assert!(resp.status.is_none());
    }

    #[test]
    fn test_sentinel_on_wrong_resource_rejected() {
        let mut req = attach_request(SENTINEL_POD, Some("attach"), SENTINEL_CONTAINER, true);
        req.resource.resource = "services".to_string();
        let resp = injector().evaluate_pod_attach_admission(&req);
        assert!(!resp.allowed);
        assert_eq!(resp.reason(), Some("ResourceMismatch"));
    }
}

mod config_tests {
    use secrets_injector_webhook::config::Args;
    use secrets_injector_webhook::{ConfigError, InjectorConfig, PathMode};

    use clap::Parser;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["secrets-injector-webhook"]).unwrap();
        let config = InjectorConfig::try_from(&args).unwrap();
        assert_eq!(config.sidecar_image(), None);
        assert_eq!(config.annotation_prefix(), "secrets.k8s.aws");
        assert_eq!(config.mount_strategy().path_mode, PathMode::Randomized);
        assert!(config.mount_strategy().inject_env_var);
        assert!(!config.hooks().wait_forever);
        assert_eq!(args.port, 8443);
        assert_eq!(args.health_port, 8080);
    }

    #[test]
    fn test_legacy_mode_flags() {
        let args = Args::try_parse_from([
            "secrets-injector-webhook",
            "--sidecar-image",
            "sidecar:2",
            "--mount-path-mode",
            "fixed",
            "--inject-secret-location-env",
            "false",
            "--enable-wait-forever-hook",
        ])
        .unwrap();
        let config = InjectorConfig::try_from(&args).unwrap();
        assert_eq!(config.init_image(), Some("sidecar:2"));
        assert_eq!(config.mount_strategy().path_mode, PathMode::Fixed);
        assert!(!config.mount_strategy().inject_env_var);
        assert!(config.hooks().wait_forever);
    }

    #[test]
    fn test_empty_image_rejected() {
        let args =
            Args::try_parse_from(["secrets-injector-webhook", "--sidecar-image", ""]).unwrap();
        assert_eq!(
            InjectorConfig::try_from(&args),
            Err(ConfigError::Empty("sidecar image"))
        );
    }
}
