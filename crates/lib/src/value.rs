//! Configuration values and references.
//!
//! A [`ConfigValue`] is what a resource declares; it may point at values that
//! only exist once something else has been reconciled. A [`Value`] is the fully
//! literal form that reaches the provider.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceId;

/// A pointer to an output produced by another stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
  /// Name of the producing stack.
  pub stack: String,
  /// Name of the output on that stack.
  pub output: String,
}

impl Reference {
  pub fn new(stack: impl Into<String>, output: impl Into<String>) -> Self {
    Self {
      stack: stack.into(),
      output: output.into(),
    }
  }
}

impl fmt::Display for Reference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.stack, self.output)
  }
}

/// A pointer to an attribute of another resource in the same stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceAttr {
  pub resource: ResourceId,
  pub attribute: String,
}

impl fmt::Display for ResourceAttr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.resource, self.attribute)
  }
}

/// A literal value, as stored by a provider and recorded in the output store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Boolean(bool),
  Number(f64),
  String(String),
  Array(Vec<Value>),
  Table(BTreeMap<String, Value>),
}

impl Value {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  /// Render this value for string interpolation.
  ///
  /// Strings are inserted verbatim and integral numbers drop their fraction;
  /// everything else uses its JSON form.
  pub fn to_interpolated(&self) -> String {
    match self {
      Value::String(s) => s.clone(),
      Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
      other => serde_json::to_string(other).unwrap_or_default(),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::String(s) => write!(f, "\"{}\"", s),
      other => write!(f, "{}", other.to_interpolated()),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Boolean(b)
  }
}

impl From<f64> for Value {
  fn from(n: f64) -> Self {
    Value::Number(n)
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Value::Number(n as f64)
  }
}

/// A declared configuration value.
///
/// Structured references serialize as single-key objects:
///
/// ```json
/// { "$output": { "stack": "dns", "output": "hostedZoneId" } }
/// { "$attr": { "resource": "alb", "attribute": "dnsName" } }
/// { "$context": "domain_name" }
/// ```
///
/// String literals may additionally embed placeholders, see
/// [`crate::placeholder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
  Output {
    #[serde(rename = "$output")]
    output: Reference,
  },
  Attr {
    #[serde(rename = "$attr")]
    attr: ResourceAttr,
  },
  Context {
    #[serde(rename = "$context")]
    context: String,
  },
  Boolean(bool),
  Number(f64),
  String(String),
  Array(Vec<ConfigValue>),
  Table(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
  /// Reference an output of another stack.
  pub fn output(stack: impl Into<String>, output: impl Into<String>) -> Self {
    ConfigValue::Output {
      output: Reference::new(stack, output),
    }
  }

  /// Reference an attribute of another resource in the same stack.
  pub fn attr(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
    ConfigValue::Attr {
      attr: ResourceAttr {
        resource: ResourceId::new(resource),
        attribute: attribute.into(),
      },
    }
  }

  /// Reference a named deployment context value.
  pub fn context(name: impl Into<String>) -> Self {
    ConfigValue::Context { context: name.into() }
  }

  /// Walk this value depth-first, calling `f` for every node.
  pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ConfigValue)) {
    f(self);
    match self {
      ConfigValue::Array(items) => {
        for item in items {
          item.visit(f);
        }
      }
      ConfigValue::Table(map) => {
        for value in map.values() {
          value.visit(f);
        }
      }
      _ => {}
    }
  }
}

impl From<Value> for ConfigValue {
  fn from(value: Value) -> Self {
    match value {
      Value::Boolean(b) => ConfigValue::Boolean(b),
      Value::Number(n) => ConfigValue::Number(n),
      Value::String(s) => ConfigValue::String(s),
      Value::Array(items) => ConfigValue::Array(items.into_iter().map(ConfigValue::from).collect()),
      Value::Table(map) => ConfigValue::Table(map.into_iter().map(|(k, v)| (k, ConfigValue::from(v))).collect()),
    }
  }
}

impl From<&str> for ConfigValue {
  fn from(s: &str) -> Self {
    ConfigValue::String(s.to_string())
  }
}

impl From<String> for ConfigValue {
  fn from(s: String) -> Self {
    ConfigValue::String(s)
  }
}

impl From<bool> for ConfigValue {
  fn from(b: bool) -> Self {
    ConfigValue::Boolean(b)
  }
}

impl From<f64> for ConfigValue {
  fn from(n: f64) -> Self {
    ConfigValue::Number(n)
  }
}

impl From<i64> for ConfigValue {
  fn from(n: i64) -> Self {
    ConfigValue::Number(n as f64)
  }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
  fn from(items: Vec<T>) -> Self {
    ConfigValue::Array(items.into_iter().map(Into::into).collect())
  }
}

/// Attribute name → literal value.
pub type Attributes = BTreeMap<String, Value>;
