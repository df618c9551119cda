use parking_lot::RwLock;
use pipecore::{Operator, OperatorDescriptor, OperatorError, RegistryError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating operator instances
pub trait OperatorFactory: Send + Sync {
    /// Create a new instance of the operator with given configuration
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError>;

    /// Registry name this factory binds to
    fn operator_type(&self) -> &str;

    /// Optional: Get operator metadata (description, category)
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::default()
    }
}

/// Metadata about an operator type
#[derive(Debug, Clone)]
pub struct OperatorMetadata {
    pub description: String,
    pub category: String,
}

impl Default for OperatorMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

type CreateFn = dyn Fn(&HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> + Send + Sync;

/// Factory backed by a closure.
pub struct FnFactory {
    operator_type: String,
    metadata: OperatorMetadata,
    create: Box<CreateFn>,
}

impl FnFactory {
    pub fn new<F>(operator_type: impl Into<String>, create: F) -> Self
    where
        F: Fn(&HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            operator_type: operator_type.into(),
            metadata: OperatorMetadata::default(),
            create: Box::new(create),
        }
    }

    pub fn with_metadata(mut self, metadata: OperatorMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl OperatorFactory for FnFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> {
        (self.create)(config)
    }

    fn operator_type(&self) -> &str {
        &self.operator_type
    }

    fn metadata(&self) -> OperatorMetadata {
        self.metadata.clone()
    }
}

/// What a registry name is bound to.
#[derive(Clone)]
pub enum Binding {
    /// One shared instance served to every request.
    Instance(Arc<dyn Operator>),
    /// Constructed afresh from descriptor config on each resolution.
    Factory(Arc<dyn OperatorFactory>),
}

/// Registry of available operators.
///
/// Safe to share across threads: lookups take a read lock, registration a
/// write lock. Registering a name that is already bound silently replaces
/// the old binding; the last writer wins.
pub struct OperatorRegistry {
    bindings: RwLock<HashMap<String, Binding>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Bind `name` to a binding, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        let replaced = self.bindings.write().insert(name.clone(), binding).is_some();
        if replaced {
            tracing::info!("Re-registering operator: {}", name);
        } else {
            tracing::info!("Registering operator: {}", name);
        }
    }

    /// Bind a shared instance under `name`.
    pub fn register_instance(&self, name: impl Into<String>, operator: Arc<dyn Operator>) {
        self.register(name, Binding::Instance(operator));
    }

    /// Bind a factory under its own operator type.
    pub fn register_factory(&self, factory: Arc<dyn OperatorFactory>) {
        let name = factory.operator_type().to_string();
        self.register(name, Binding::Factory(factory));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.bindings.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.read().contains_key(name)
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.read().get(name).cloned()
    }

    /// Resolve a name to an operator, building factories with empty config.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Operator>, RegistryError> {
        self.create(name, &HashMap::new())
    }

    /// Resolve a name; factory bindings receive `config`, instances ignore it.
    pub fn create(
        &self,
        name: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Arc<dyn Operator>, RegistryError> {
        // Clone the binding out so factories never run under the lock.
        let binding = self.binding(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })?;

        match binding {
            Binding::Instance(operator) => Ok(operator),
            Binding::Factory(factory) => {
                factory
                    .create(config)
                    .map_err(|source| RegistryError::Construction {
                        name: name.to_string(),
                        source,
                    })
            }
        }
    }

    /// Obtain the operator for a pipeline node.
    pub fn instantiate(
        &self,
        descriptor: &OperatorDescriptor,
    ) -> Result<Arc<dyn Operator>, RegistryError> {
        self.create(&descriptor.operator_type, &descriptor.config)
    }

    /// Get all registered names, sorted
    pub fn list_operators(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get metadata for a registered name
    pub fn get_metadata(&self, name: &str) -> Option<OperatorMetadata> {
        self.binding(name).map(|binding| match binding {
            Binding::Factory(factory) => factory.metadata(),
            Binding::Instance(_) => OperatorMetadata {
                description: String::new(),
                category: "instance".to_string(),
            },
        })
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
