//! Placeholder parsing and substitution inside string values.
//!
//! Structured references (`{"$output": ...}`) replace a whole value. When a
//! value needs to be spliced into a longer string, such as a health check URL
//! built from the domain name, a placeholder is embedded instead.
//!
//! # Placeholder Formats
//!
//! - `$${output:<stack>:<name>}` - an output recorded by another stack
//! - `$${attr:<resource>:<attribute>}` - an attribute of a resource in the same stack
//! - `$${context:<name>}` - a named deployment context value
//!
//! # Shell Variables
//!
//! Single `$` characters pass through unchanged, so strings such as inline
//! scripts keep `$HOME` and `${VAR}` intact.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use stackflow_lib::placeholder::{parse, Segment, Placeholder};
//!
//! let segments = parse("https://$${context:domain_name}/api/health").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("https://".to_string()),
//!     Segment::Placeholder(Placeholder::Context("domain_name".to_string())),
//!     Segment::Literal("/api/health".to_string()),
//! ]);
//! ```

use thiserror::Error;

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `$${output:<stack>:<name>}`
  Output { stack: String, output: String },

  /// `$${attr:<resource>:<attribute>}`
  Attr { resource: String, attribute: String },

  /// `$${context:<name>}`
  Context(String),
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder type: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("unresolved output: {stack}.{output}")]
  UnresolvedOutput { stack: String, output: String },

  #[error("unresolved attribute: {resource}.{attribute}")]
  UnresolvedAttr { resource: String, attribute: String },

  #[error("unresolved context value: {0}")]
  UnresolvedContext(String),
}

/// Trait for resolving placeholder values during materialization.
pub trait Resolver {
  /// Resolve an output recorded by another stack.
  fn resolve_output(&self, stack: &str, output: &str) -> Result<String, PlaceholderError>;

  /// Resolve an attribute of an already reconciled resource in the same stack.
  fn resolve_attr(&self, resource: &str, attribute: &str) -> Result<String, PlaceholderError>;

  /// Resolve a named context value.
  fn resolve_context(&self, name: &str) -> Result<String, PlaceholderError>;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed (unclosed, unknown type, etc.)
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();

        match chars.peek() {
          Some((_, '$')) => {
            chars.next();

            if let Some((_, '{')) = chars.peek() {
              // $$${ -> literal $${
              literal.push_str("$${");
              chars.next();
            } else {
              literal.push_str("$$$");
            }
          }
          Some((_, '{')) => {
            chars.next();

            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let mut content = String::new();
            let mut found_close = false;

            for (_, c) in chars.by_ref() {
              if c == '}' {
                found_close = true;
                break;
              }
              content.push(c);
            }

            if !found_close {
              return Err(PlaceholderError::Unclosed(pos));
            }

            segments.push(Segment::Placeholder(parse_placeholder_content(&content)?));
          }
          _ => literal.push_str("$$"),
        }
      }
      // A lone $ passes through
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content inside a placeholder (everything between `$${` and `}`).
fn parse_placeholder_content(content: &str) -> Result<Placeholder, PlaceholderError> {
  let (kind, rest) = content
    .split_once(':')
    .ok_or_else(|| PlaceholderError::Malformed(format!("missing colon in '{content}'")))?;

  match kind {
    "output" => {
      let (stack, output) = split_pair(rest, content)?;
      Ok(Placeholder::Output { stack, output })
    }
    "attr" => {
      let (resource, attribute) = split_pair(rest, content)?;
      Ok(Placeholder::Attr { resource, attribute })
    }
    "context" => {
      if rest.is_empty() {
        return Err(PlaceholderError::Malformed(format!("empty context name in '{content}'")));
      }
      Ok(Placeholder::Context(rest.to_string()))
    }
    _ => Err(PlaceholderError::UnknownType(kind.to_string())),
  }
}

fn split_pair(rest: &str, content: &str) -> Result<(String, String), PlaceholderError> {
  match rest.split_once(':') {
    Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a.to_string(), b.to_string())),
    _ => Err(PlaceholderError::Malformed(format!("expected two fields in '{content}'"))),
  }
}

/// Collect every placeholder in a string without resolving anything.
pub fn placeholders(input: &str) -> Result<Vec<Placeholder>, PlaceholderError> {
  Ok(
    parse(input)?
      .into_iter()
      .filter_map(|segment| match segment {
        Segment::Placeholder(p) => Some(p),
        Segment::Literal(_) => None,
      })
      .collect(),
  )
}

/// Substitute all placeholders in a string using the provided resolver.
///
/// # Errors
///
/// Returns an error if parsing fails or if any placeholder cannot be resolved.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(p) => {
        let value = match p {
          Placeholder::Output { stack, output } => resolver.resolve_output(stack, output)?,
          Placeholder::Attr { resource, attribute } => resolver.resolve_attr(resource, attribute)?,
          Placeholder::Context(name) => resolver.resolve_context(name)?,
        };
        result.push_str(&value);
      }
    }
  }

  Ok(result)
}
