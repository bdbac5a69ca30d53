//! Implementation of the `stackflow outputs` command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use owo_colors::{OwoColorize, Stream};

use stackflow_lib::outputs::OutputSnapshot;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

pub fn cmd_outputs(path: &Path, stack: Option<&str>, output: OutputFormat) -> Result<()> {
  let snapshot = OutputSnapshot::load(path).with_context(|| format!("Failed to load outputs: {}", path.display()))?;

  let stacks: Vec<_> = match stack {
    Some(name) => match snapshot.stack(name) {
      Some(outputs) => vec![outputs],
      None => bail!("no outputs recorded for stack '{}'", name),
    },
    None => snapshot.stacks.iter().collect(),
  };

  if output.is_json() {
    return match stack {
      Some(_) => print_json(&stacks),
      None => print_json(&snapshot),
    };
  }

  print_info(&format!("Outputs of '{}'", snapshot.environment));
  if stacks.is_empty() {
    print_stat("Stacks", "0");
    return Ok(());
  }

  for outputs in stacks {
    println!();
    println!("{}", outputs.stack.if_supports_color(Stream::Stdout, |s| s.bold()));
    for (name, value) in &outputs.outputs {
      print_stat(name, &value.to_interpolated());
    }
  }

  Ok(())
}
