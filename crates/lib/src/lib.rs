//! stackflow-lib: dependency-ordered provisioning of stacks
//!
//! This crate provides the orchestration core of stackflow:
//! - `Deployment`: an immutable set of stacks plus named context values
//! - `graph`: reference validation, stack order and resource waves
//! - `reconcile`: converging one stack onto a `Provider`
//! - `orchestrator`: running every stack in order and threading outputs between them

pub mod cancel;
pub mod consts;
pub mod deployment;
pub mod graph;
pub mod orchestrator;
pub mod outputs;
pub mod placeholder;
pub mod provider;
pub mod reconcile;
pub mod resource;
pub mod stack;
pub mod value;
