mod common;

use common::{Behavior, Journal, TestOperator};
use pipecore::{OperatorError, RegistryError, Value};
use piperuntime::{Binding, FnFactory, OperatorMetadata, OperatorRegistry};
use std::collections::HashMap;
use std::sync::Arc;

#[test]
fn test_last_registration_wins() {
    let journal = Journal::default();
    let registry = OperatorRegistry::new();

    registry.register_instance("auth", Arc::new(TestOperator::new("first", Behavior::Succeed, &journal)));
    registry.register_instance("auth", Arc::new(TestOperator::new("second", Behavior::Succeed, &journal)));

    let resolved = registry.resolve("auth").unwrap();
    assert_eq!(resolved.name(), "second");
    assert_eq!(registry.list_operators(), vec!["auth"]);
}

#[test]
fn test_resolve_unknown_name() {
    let registry = OperatorRegistry::new();

    let err = registry.resolve("ghost").err().unwrap();
    assert!(matches!(err, RegistryError::NotFound { ref name } if name == "ghost"));
}

#[test]
fn test_factory_receives_config() {
    let registry = OperatorRegistry::new();
    registry.register_factory(Arc::new(
        FnFactory::new("named", |config: &HashMap<String, Value>| {
            let label = config
                .get("label")
                .and_then(Value::as_str)
                .ok_or_else(|| OperatorError::Configuration("Missing config: label".into()))?;
            let journal = Journal::default();
            Ok(Arc::new(TestOperator::new(label, Behavior::Succeed, &journal)) as _)
        })
        .with_metadata(OperatorMetadata {
            description: "Test factory".into(),
            category: "test".into(),
        }),
    ));

    let mut config = HashMap::new();
    config.insert("label".to_string(), Value::from("built"));
    let operator = registry.create("named", &config).unwrap();
    assert_eq!(operator.name(), "built");

    let err = registry.resolve("named").err().unwrap();
    match err {
        RegistryError::Construction { name, source } => {
            assert_eq!(name, "named");
            assert_eq!(source, OperatorError::Configuration("Missing config: label".into()));
        }
        other => panic!("expected construction error, got {:?}", other),
    }

    assert_eq!(registry.get_metadata("named").unwrap().category, "test");
}

#[test]
fn test_instance_bindings_are_shared() {
    let journal = Journal::default();
    let registry = OperatorRegistry::new();
    registry.register("shared", Binding::Instance(Arc::new(TestOperator::new("shared", Behavior::Succeed, &journal))));

    let first = registry.resolve("shared").unwrap();
    let second = registry.resolve("shared").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_registration_and_lookup() {
    let registry = OperatorRegistry::new();
    let journal = Journal::default();
    registry.register_instance("base", Arc::new(TestOperator::new("base", Behavior::Succeed, &journal)));

    std::thread::scope(|scope| {
        for writer in 0..4 {
            let registry = &registry;
            let journal = journal.clone();
            scope.spawn(move || {
                for i in 0..50 {
                    let name = format!("op-{}-{}", writer, i);
                    registry.register_instance(
                        name.clone(),
                        Arc::new(TestOperator::new(&name, Behavior::Succeed, &journal)),
                    );
                }
            });
        }
        for _ in 0..8 {
            let registry = &registry;
            scope.spawn(move || {
                for _ in 0..200 {
                    assert!(registry.resolve("base").is_ok());
                }
            });
        }
    });

    assert_eq!(registry.list_operators().len(), 1 + 4 * 50);
}
