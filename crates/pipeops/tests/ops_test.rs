use pipecore::{
    Identity, OperatorError, PipelineConfig, PipelineError, RegistryError, RequestContext, Value,
};
use piperuntime::{OperatorRegistry, PipelineRuntime, RuntimeConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn registry() -> OperatorRegistry {
    let registry = OperatorRegistry::new();
    pipeops::register_all(&registry);
    registry
}

fn config(entries: &[(&str, Value)]) -> HashMap<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn input(json: serde_json::Value) -> Value {
    Value::from(json)
}

#[test]
fn test_register_all_lists_builtins() {
    let registry = registry();
    assert_eq!(
        registry.list_operators(),
        vec![
            "auth.identity",
            "debug.log",
            "fail",
            "json.extract",
            "request.validate",
            "respond",
            "time.delay",
        ]
    );
    assert_eq!(registry.get_metadata("auth.identity").unwrap().category, "auth");
}

#[tokio::test]
async fn test_validate_rejects_missing_fields() {
    let registry = registry();
    let operator = registry
        .create(
            "request.validate",
            &config(&[("required", Value::Array(vec!["user".into(), "password".into()]))]),
        )
        .unwrap();

    let err = operator
        .execute(RequestContext::new(), &input(serde_json::json!({"user": "ada"})))
        .await
        .err()
        .unwrap();
    match err {
        OperatorError::Rejected { detail, status, .. } => {
            assert_eq!(status, 400);
            assert!(detail.contains("password"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    let ok = operator
        .execute(
            RequestContext::new(),
            &input(serde_json::json!({"user": "ada", "password": "pw"})),
        )
        .await;
    assert!(ok.is_ok());
}

#[test]
fn test_validate_config_must_be_strings() {
    let registry = registry();
    let err = registry
        .create("request.validate", &config(&[("required", Value::from(3.0))]))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RegistryError::Construction {
            source: OperatorError::Configuration(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_identity_sets_user_and_token() {
    let registry = registry();
    let operator = registry.resolve("auth.identity").unwrap();

    let output = operator
        .execute(
            RequestContext::new(),
            &input(serde_json::json!({"user": "ada", "roles": ["admin"], "token": "t-1"})),
        )
        .await
        .unwrap();

    assert_eq!(
        output.context.user(),
        Some(&Identity::new("ada").with_role("admin"))
    );
    assert_eq!(output.context.token(), Some("t-1"));
    assert_eq!(output.data.as_str(), Some("ada"));
}

#[tokio::test]
async fn test_identity_requires_user() {
    let registry = registry();
    let operator = registry
        .create("auth.identity", &config(&[("field", Value::from("login"))]))
        .unwrap();

    let err = operator
        .execute(RequestContext::new(), &input(serde_json::json!({"user": "ada"})))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OperatorError::Rejected { status: 401, .. }));
}

#[tokio::test]
async fn test_extract_field() {
    let registry = registry();
    assert!(matches!(
        registry.resolve("json.extract").err(),
        Some(RegistryError::Construction { .. })
    ));

    let operator = registry
        .create("json.extract", &config(&[("field", Value::from("order"))]))
        .unwrap();

    let output = operator
        .execute(
            RequestContext::new(),
            &input(serde_json::json!({"order": {"id": 7}})),
        )
        .await
        .unwrap();
    assert_eq!(output.data.get("id").and_then(Value::as_f64), Some(7.0));

    let err = operator
        .execute(RequestContext::new(), &input(serde_json::json!({})))
        .await
        .err()
        .unwrap();
    assert_eq!(err, OperatorError::MissingInput("order".into()));
}

#[tokio::test]
async fn test_delay_observes_cancellation() {
    let registry = registry();
    let operator = registry
        .create("time.delay", &config(&[("delay_ms", Value::from(60_000.0))]))
        .unwrap();

    let ctx = RequestContext::new();
    ctx.cancellation().cancel();

    let err = operator.execute(ctx, &Value::Null).await.err().unwrap();
    assert_eq!(err, OperatorError::Cancelled);
}

#[tokio::test]
async fn test_fail_uses_configured_message() {
    let registry = registry();
    let operator = registry
        .create("fail", &config(&[("message", Value::from("boom"))]))
        .unwrap();

    let err = operator
        .execute(RequestContext::new(), &Value::Null)
        .await
        .err()
        .unwrap();
    assert_eq!(err, OperatorError::ExecutionFailed("boom".into()));
}

const LOGIN: &str = r#"{
    "name": "login",
    "operators": {
        "validate": {"type": "request.validate", "config": {"required": ["user"]}},
        "auth": {"type": "auth.identity"},
        "log": {"type": "debug.log"},
        "respond": {}
    },
    "dependencies": {
        "auth": "validate",
        "log": "validate",
        "respond": ["auth", "log"]
    }
}"#;

fn login_runtime() -> PipelineRuntime {
    let registry = Arc::new(registry());
    let runtime = PipelineRuntime::with_registry(registry, RuntimeConfig::default());
    runtime
        .load_config(&PipelineConfig::from_json_str(LOGIN).unwrap())
        .unwrap();
    runtime
}

#[tokio::test]
async fn test_login_pipeline_end_to_end() {
    let runtime = login_runtime();
    assert_eq!(
        runtime.plan("login").unwrap().levels(),
        &[
            vec!["validate".to_string()],
            vec!["auth".to_string(), "log".to_string()],
            vec!["respond".to_string()],
        ]
    );

    for parallel in [false, true] {
        let options = runtime
            .options(input(serde_json::json!({"user": "ada"})))
            .parallel(parallel);
        let outcome = runtime
            .execute(RequestContext::new(), "login", options)
            .await
            .unwrap();

        assert!(outcome.is_success(), "parallel={}", parallel);
        assert_eq!(outcome.context.user().map(|u| u.user_id.as_str()), Some("ada"));

        let response = outcome.response();
        assert_eq!(response.status, 200);
        assert_eq!(response.data.get("user").and_then(Value::as_str), Some("ada"));
    }
}

#[tokio::test]
async fn test_login_pipeline_rejection_maps_status() {
    let runtime = login_runtime();

    let outcome = runtime
        .execute(
            RequestContext::new(),
            "login",
            runtime.options(input(serde_json::json!({"password": "pw"}))),
        )
        .await
        .unwrap();

    assert_eq!(outcome.failed_operator(), Some("validate"));
    assert_eq!(outcome.results.len(), 1);
    assert!(matches!(outcome.error, Some(PipelineError::OperatorFailed { .. })));
    assert_eq!(outcome.response().status, 400);
}

#[tokio::test]
async fn test_delay_pipeline_times_out() {
    let registry = Arc::new(registry());
    let runtime = PipelineRuntime::with_registry(registry, RuntimeConfig::default());
    runtime
        .load_config(
            &PipelineConfig::from_json_str(
                r#"{"name": "slow", "operators": {"wait": {"type": "time.delay", "config": {"delay_ms": 5000}}}, "dependencies": {"wait": ""}}"#,
            )
            .unwrap(),
        )
        .unwrap();

    let options = runtime.options(Value::Null).timeout(Duration::from_millis(50));
    let started = std::time::Instant::now();
    let outcome = runtime
        .execute(RequestContext::new(), "slow", options)
        .await
        .unwrap();

    assert!(!outcome.is_success());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.response().status, 500);
}
