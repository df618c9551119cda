use crate::{ConfigError, OperatorDescriptor, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// How a `dependencies` entry `op -> [targets]` is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyDirection {
    /// `op` requires every target: targets run first.
    #[default]
    Requires,
    /// Every target requires `op`: `op` runs first.
    RequiredBy,
}

/// One entry of a dependency map; a single name or a list of names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependencies {
    One(String),
    Many(Vec<String>),
}

impl Dependencies {
    /// Non-blank dependency names. Blank entries mean "no dependency".
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let names: Vec<&str> = match self {
            Dependencies::One(name) => vec![name.as_str()],
            Dependencies::Many(names) => names.iter().map(String::as_str).collect(),
        };
        names.into_iter().filter(|name| !name.trim().is_empty())
    }
}

impl Default for Dependencies {
    fn default() -> Self {
        Dependencies::Many(Vec::new())
    }
}

/// `from` must complete before `to` becomes eligible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

/// Declared type and config of a node, as written in a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub operator_type: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, Value>,
}

/// A named pipeline: its operators and the dependencies between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(alias = "server_name")]
    pub name: String,
    #[serde(default)]
    pub direction: DependencyDirection,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operators: BTreeMap<String, OperatorSpec>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependencies>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: DependencyDirection::default(),
            operators: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn with_direction(mut self, direction: DependencyDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Declare `operator` with the given dependency entries, appending to
    /// any already declared.
    pub fn depends_on<I, S>(mut self, operator: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.dependencies.entry(operator.into()).or_default();
        let mut names: Vec<String> = match std::mem::take(entry) {
            Dependencies::One(name) => vec![name],
            Dependencies::Many(names) => names,
        };
        names.extend(deps.into_iter().map(Into::into));
        *entry = Dependencies::Many(names);
        self
    }

    /// Bind node `name` to a registry type with config.
    pub fn with_operator(
        mut self,
        name: impl Into<String>,
        operator_type: impl Into<String>,
        config: HashMap<String, Value>,
    ) -> Self {
        self.operators.insert(
            name.into(),
            OperatorSpec {
                operator_type: Some(operator_type.into()),
                config,
            },
        );
        self
    }

    /// Every node: dependency keys, non-blank targets and declared operators.
    pub fn operator_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for (operator, deps) in &self.dependencies {
            names.insert(operator.clone());
            names.extend(deps.names().map(str::to_string));
        }
        names.extend(self.operators.keys().cloned());
        names.into_iter().collect()
    }

    /// Dependency entries normalised to `from -> to` edges.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges = Vec::new();
        for (operator, deps) in &self.dependencies {
            for dep in deps.names() {
                let edge = match self.direction {
                    DependencyDirection::Requires => DependencyEdge {
                        from: dep.to_string(),
                        to: operator.clone(),
                    },
                    DependencyDirection::RequiredBy => DependencyEdge {
                        from: operator.clone(),
                        to: dep.to_string(),
                    },
                };
                edges.push(edge);
            }
        }
        edges
    }

    /// Descriptor for a node; undeclared nodes bind to their own name.
    pub fn descriptor(&self, name: &str) -> OperatorDescriptor {
        let mut descriptor = OperatorDescriptor::named(name);
        if let Some(spec) = self.operators.get(name) {
            if let Some(operator_type) = &spec.operator_type {
                descriptor.operator_type = operator_type.clone();
            }
            descriptor.config = spec.config.clone();
        }
        descriptor
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Many(Vec<PipelineDefinition>),
    One(PipelineDefinition),
}

/// The set of pipeline definitions loaded from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub pipelines: Vec<PipelineDefinition>,
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let pipelines = match serde_json::from_str::<ConfigDocument>(raw)? {
            ConfigDocument::Many(pipelines) => pipelines,
            ConfigDocument::One(pipeline) => vec![pipeline],
        };

        let mut seen = BTreeSet::new();
        for pipeline in &pipelines {
            if pipeline.name.trim().is_empty() {
                return Err(ConfigError::Invalid("pipeline name must not be blank".into()));
            }
            if !seen.insert(pipeline.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate pipeline name: {}",
                    pipeline.name
                )));
            }
        }

        tracing::debug!("Parsed {} pipeline definitions", pipelines.len());
        Ok(Self { pipelines })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn get(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.pipelines)?)
    }
}
