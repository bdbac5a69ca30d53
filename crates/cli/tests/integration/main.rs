mod common;
mod deploy_tests;
mod plan_tests;
mod prune_tests;
mod rollback_tests;
mod validate_tests;
