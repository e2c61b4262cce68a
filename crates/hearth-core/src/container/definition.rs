use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One constructor argument of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Argument {
    /// Another service, written `@id` in definition files
    Service(String),
    /// A container parameter, written `%name%`
    Parameter(String),
    /// A literal value
    Value(Value),
}

impl Argument {
    /// Interpret a raw value from a definition file. `@@` and `%%` escape the
    /// reference markers.
    pub fn parse(raw: Value) -> Self {
        if let Value::String(text) = &raw {
            if let Some(rest) = text.strip_prefix("@@") {
                return Argument::Value(Value::String(format!("@{}", rest)));
            }
            if let Some(id) = text.strip_prefix('@') {
                return Argument::Service(id.to_string());
            }
            if let Some(rest) = text.strip_prefix("%%") {
                return Argument::Value(Value::String(format!("%{}", rest)));
            }
            if text.len() > 2 && text.starts_with('%') && text.ends_with('%') {
                return Argument::Parameter(text[1..text.len() - 1].to_string());
            }
        }
        Argument::Value(raw)
    }
}

/// A tag attached to a service, e.g. `persist`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }
}

/// How the container obtains an instance for a service id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Name of the factory in the kernel's factory registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// Synthetic services are never constructed by the container; an
    /// instance has to be set from outside.
    #[serde(default)]
    pub synthetic: bool,
    /// Where the definition came from (services file or provider name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ServiceDefinition {
    /// Definition built by the named factory
    pub fn new(factory: impl Into<String>) -> Self {
        Self {
            factory: Some(factory.into()),
            ..Self::default()
        }
    }

    /// Definition whose instance is injected at runtime
    pub fn synthetic() -> Self {
        Self {
            synthetic: true,
            ..Self::default()
        }
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(Tag::new(tag));
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }

    /// Ids of the services this definition references
    pub fn service_references(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().filter_map(|argument| match argument {
            Argument::Service(id) => Some(id.as_str()),
            _ => None,
        })
    }
}
