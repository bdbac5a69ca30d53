mod deploy;
mod outputs;
mod plan;
mod prune;
mod rollback;
mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use stackflow_lib::deployment::Deployment;
use stackflow_lib::provider::LocalProvider;

pub use deploy::{DeployArgs, cmd_deploy};
pub use outputs::cmd_outputs;
pub use plan::cmd_plan;
pub use prune::cmd_prune;
pub use rollback::cmd_rollback;
pub use validate::cmd_validate;

fn load_deployment(file: &Path) -> Result<Deployment> {
  Deployment::from_path(file).with_context(|| format!("Failed to load deployment: {}", file.display()))
}

fn open_state(state: &Path) -> Result<Arc<LocalProvider>> {
  let provider = LocalProvider::open(state).with_context(|| format!("Failed to open state: {}", state.display()))?;
  Ok(Arc::new(provider))
}

fn runtime() -> Result<Runtime> {
  Runtime::new().context("Failed to create async runtime")
}
