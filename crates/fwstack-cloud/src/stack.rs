//! Construct graph
//!
//! A [`Stack`] collects resources, parameters and outputs in declaration order.
//! References between resources are checked when a resource is added: the
//! referenced resource or parameter must already be declared.

use crate::error::{CloudError, Result};
use crate::path::ConstructPath;
use crate::template::Template;
use crate::token::{Token, references};
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value, json};

const FORMAT_VERSION: &str = "2010-09-09";
const PATH_METADATA_KEY: &str = "fwstack:path";

/// Handle to a declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    logical_id: String,
    resource_type: String,
    path: ConstructPath,
}

impl ResourceRef {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    /// `{"Ref": logical_id}`
    pub fn ref_token(&self) -> Token {
        Token::Ref(self.logical_id.clone())
    }

    /// `{"Fn::GetAtt": [logical_id, attribute]}`
    pub fn attr(&self, attribute: &str) -> Token {
        Token::GetAtt {
            logical_id: self.logical_id.clone(),
            attribute: attribute.to_string(),
        }
    }
}

/// Template parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub parameter_type: String,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(parameter_type: impl Into<String>) -> Self {
        Self {
            parameter_type: parameter_type.into(),
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("Type".to_string(), json!(self.parameter_type));
        if let Some(default) = &self.default {
            obj.insert("Default".to_string(), default.clone());
        }
        if let Some(description) = &self.description {
            obj.insert("Description".to_string(), json!(description));
        }
        Value::Object(obj)
    }
}

#[derive(Debug, Clone)]
enum Override {
    Set { path: Vec<String>, value: Value },
    Delete { path: Vec<String> },
}

#[derive(Debug, Clone)]
struct ResourceEntry {
    path: ConstructPath,
    resource_type: String,
    properties: Value,
    depends_on: Vec<String>,
    overrides: Vec<Override>,
}

#[derive(Debug, Clone)]
struct OutputEntry {
    value: Value,
    description: Option<String>,
}

/// A single deployable stack
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    description: Option<String>,
    constructs: IndexSet<ConstructPath>,
    resources: IndexMap<String, ResourceEntry>,
    parameters: IndexMap<String, Parameter>,
    outputs: IndexMap<String, OutputEntry>,
}

impl Stack {
    /// Create an empty stack
    ///
    /// Stack names follow CloudFormation rules: they start with a letter and
    /// contain only letters, digits and hyphens (at most 128 characters).
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= 128
            && name.starts_with(|c: char| c.is_ascii_alphabetic())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(CloudError::InvalidConfig(format!(
                "invalid stack name: '{}'",
                name
            )));
        }

        Ok(Self {
            name,
            description: None,
            constructs: IndexSet::new(),
            resources: IndexMap::new(),
            parameters: IndexMap::new(),
            outputs: IndexMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Register a construct node
    ///
    /// The parent of a nested path must already be registered.
    pub fn register(&mut self, path: &ConstructPath) -> Result<()> {
        if let Some(parent) = path.parent()
            && !self.constructs.contains(&parent)
        {
            return Err(CloudError::InvalidConfig(format!(
                "scope '{}' is not registered (child '{}')",
                parent,
                path.id()
            )));
        }
        if !self.constructs.insert(path.clone()) {
            return Err(CloudError::DuplicateConstruct(path.to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, path: &ConstructPath) -> bool {
        self.constructs.contains(path)
    }

    /// Declare a resource at `path`
    pub fn add_resource(
        &mut self,
        path: ConstructPath,
        resource_type: &str,
        properties: Value,
    ) -> Result<ResourceRef> {
        let logical_id = path.logical_id();
        if let Some(existing) = self.resources.get(&logical_id) {
            return Err(CloudError::LogicalIdCollision {
                logical_id,
                first: existing.path.to_string(),
                second: path.to_string(),
            });
        }
        if self.parameters.contains_key(&logical_id) {
            return Err(CloudError::LogicalIdCollision {
                logical_id: logical_id.clone(),
                first: logical_id,
                second: path.to_string(),
            });
        }
        self.check_references(&path.to_string(), &properties)?;
        self.register(&path)?;

        tracing::debug!(
            logical_id = %logical_id,
            resource_type = %resource_type,
            path = %path,
            "Declared resource"
        );

        self.resources.insert(
            logical_id.clone(),
            ResourceEntry {
                path: path.clone(),
                resource_type: resource_type.to_string(),
                properties,
                depends_on: Vec::new(),
                overrides: Vec::new(),
            },
        );

        Ok(ResourceRef {
            logical_id,
            resource_type: resource_type.to_string(),
            path,
        })
    }

    /// Add an explicit `DependsOn` edge
    pub fn add_dependency(&mut self, resource: &ResourceRef, on: &ResourceRef) -> Result<()> {
        if !self.resources.contains_key(on.logical_id()) {
            return Err(CloudError::UnresolvedReference {
                from: resource.path().to_string(),
                target: on.logical_id().to_string(),
            });
        }
        let entry = self
            .resources
            .get_mut(resource.logical_id())
            .ok_or_else(|| CloudError::ResourceNotFound(resource.logical_id().to_string()))?;
        if !entry.depends_on.iter().any(|d| d == on.logical_id()) {
            entry.depends_on.push(on.logical_id().to_string());
        }
        Ok(())
    }

    /// Declare a template parameter and return a `Ref` to it
    ///
    /// Declaring the same parameter twice with an identical definition returns
    /// the existing one.
    pub fn add_parameter(&mut self, id: &str, parameter: Parameter) -> Result<Token> {
        let logical_id = ConstructPath::root(id)?.logical_id();
        if self.resources.contains_key(&logical_id) {
            return Err(CloudError::LogicalIdCollision {
                logical_id: logical_id.clone(),
                first: logical_id,
                second: id.to_string(),
            });
        }
        match self.parameters.get(&logical_id) {
            Some(existing) if *existing == parameter => {}
            Some(_) => return Err(CloudError::DuplicateConstruct(id.to_string())),
            None => {
                tracing::debug!(parameter = %logical_id, "Declared parameter");
                self.parameters.insert(logical_id.clone(), parameter);
            }
        }
        Ok(Token::Ref(logical_id))
    }

    /// Declare a stack output
    pub fn add_output(
        &mut self,
        id: &str,
        value: impl Into<Value>,
        description: Option<&str>,
    ) -> Result<()> {
        let logical_id = ConstructPath::root(id)?.logical_id();
        if self.outputs.contains_key(&logical_id) {
            return Err(CloudError::DuplicateConstruct(format!("output {}", id)));
        }
        let value = value.into();
        self.check_references(&format!("output {}", id), &value)?;
        self.outputs.insert(
            logical_id,
            OutputEntry {
                value,
                description: description.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Find a resource declared as the direct child `id` of `parent`
    pub fn find_child(&self, parent: &ConstructPath, id: &str) -> Option<ResourceRef> {
        self.resources
            .iter()
            .find(|(_, e)| e.path.is_child_of(parent) && e.path.id() == id)
            .map(|(logical_id, e)| ResourceRef {
                logical_id: logical_id.clone(),
                resource_type: e.resource_type.clone(),
                path: e.path.clone(),
            })
    }

    /// Properties of a declared resource, before overrides
    pub fn properties(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id).map(|e| &e.properties)
    }

    /// Declared resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = ResourceRef> + '_ {
        self.resources.iter().map(|(logical_id, e)| ResourceRef {
            logical_id: logical_id.clone(),
            resource_type: e.resource_type.clone(),
            path: e.path.clone(),
        })
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Set a raw value on the synthesized resource (e.g. `Properties.VpcEndpointId`)
    pub fn add_override(
        &mut self,
        resource: &ResourceRef,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let segments = split_override_path(path)?;
        self.check_references(&resource.path().to_string(), &value)?;
        let entry = self.entry_mut(resource)?;
        entry.overrides.push(Override::Set {
            path: segments,
            value,
        });
        Ok(())
    }

    /// Remove a value from the synthesized resource (e.g. `Properties.NatGatewayId`)
    pub fn add_deletion_override(&mut self, resource: &ResourceRef, path: &str) -> Result<()> {
        let segments = split_override_path(path)?;
        let entry = self.entry_mut(resource)?;
        entry.overrides.push(Override::Delete { path: segments });
        Ok(())
    }

    /// Render the stack into a CloudFormation template
    pub fn synthesize(&self) -> Result<Template> {
        let mut resources = IndexMap::new();

        for (logical_id, entry) in &self.resources {
            let mut obj = Map::new();
            obj.insert("Type".to_string(), json!(entry.resource_type));
            obj.insert("Properties".to_string(), entry.properties.clone());
            if !entry.depends_on.is_empty() {
                obj.insert("DependsOn".to_string(), json!(entry.depends_on));
            }
            let mut metadata = Map::new();
            metadata.insert(PATH_METADATA_KEY.to_string(), json!(entry.path.to_string()));
            obj.insert("Metadata".to_string(), Value::Object(metadata));

            let mut rendered = Value::Object(obj);
            for ov in &entry.overrides {
                apply_override(&mut rendered, ov)
                    .map_err(|_| CloudError::InvalidOverridePath(logical_id.clone()))?;
            }
            resources.insert(logical_id.clone(), rendered);
        }

        let parameters = self
            .parameters
            .iter()
            .map(|(k, p)| (k.clone(), p.to_value()))
            .collect();

        let outputs = self
            .outputs
            .iter()
            .map(|(k, o)| {
                let mut obj = Map::new();
                obj.insert("Value".to_string(), o.value.clone());
                if let Some(d) = &o.description {
                    obj.insert("Description".to_string(), json!(d));
                }
                (k.clone(), Value::Object(obj))
            })
            .collect();

        tracing::info!(
            stack = %self.name,
            resources = self.resources.len(),
            parameters = self.parameters.len(),
            "Synthesized stack"
        );

        Ok(Template {
            format_version: FORMAT_VERSION.to_string(),
            description: self.description.clone(),
            parameters,
            resources,
            outputs,
        })
    }

    fn entry_mut(&mut self, resource: &ResourceRef) -> Result<&mut ResourceEntry> {
        self.resources
            .get_mut(resource.logical_id())
            .ok_or_else(|| CloudError::ResourceNotFound(resource.logical_id().to_string()))
    }

    fn check_references(&self, from: &str, value: &Value) -> Result<()> {
        for target in references(value) {
            if !self.resources.contains_key(&target) && !self.parameters.contains_key(&target) {
                return Err(CloudError::UnresolvedReference {
                    from: from.to_string(),
                    target,
                });
            }
        }
        Ok(())
    }
}

fn split_override_path(path: &str) -> Result<Vec<String>> {
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return Err(CloudError::InvalidOverridePath(path.to_string()));
    }
    Ok(segments)
}

fn apply_override(target: &mut Value, ov: &Override) -> std::result::Result<(), ()> {
    match ov {
        Override::Set { path, value } => {
            let (last, parents) = path.split_last().ok_or(())?;
            let mut cursor = target;
            for key in parents {
                let obj = cursor.as_object_mut().ok_or(())?;
                cursor = obj
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            cursor
                .as_object_mut()
                .ok_or(())?
                .insert(last.clone(), value.clone());
        }
        Override::Delete { path } => {
            let (last, parents) = path.split_last().ok_or(())?;
            let mut cursor = target;
            for key in parents {
                match cursor.get_mut(key.as_str()) {
                    Some(next) => cursor = next,
                    None => return Ok(()),
                }
            }
            if let Some(obj) = cursor.as_object_mut() {
                obj.shift_remove(last.as_str());
            }
        }
    }
    Ok(())
}
