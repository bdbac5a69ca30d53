mod common;
mod deploy_tests;
mod failure_tests;
mod plan_tests;
