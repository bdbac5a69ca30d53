use std::collections::BTreeSet;

use crate::provider::LiveState;
use crate::resource::ResourceKind;
use crate::value::Attributes;

use super::types::ChangeKind;

/// Classify desired against live state.
///
/// Only attributes the kind accepts are compared; custom kinds compare every
/// key either side carries. Returns the differing attribute names for updates.
pub(crate) fn diff(kind: &ResourceKind, desired: &Attributes, live: Option<&LiveState>) -> (ChangeKind, Vec<String>) {
  let Some(live) = live else {
    return (ChangeKind::Create, Vec::new());
  };

  let tracked: BTreeSet<&str> = match kind.config_attributes() {
    Some(attrs) => attrs.iter().copied().collect(),
    None => desired
      .keys()
      .chain(live.config.keys())
      .map(String::as_str)
      .collect(),
  };

  let changed: Vec<String> = tracked
    .into_iter()
    .filter(|attr| desired.get(*attr) != live.config.get(*attr))
    .map(str::to_string)
    .collect();

  if changed.is_empty() {
    (ChangeKind::Unchanged, changed)
  } else {
    (ChangeKind::Update, changed)
  }
}
