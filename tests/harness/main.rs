//! Harness Integration Tests
//!
//! End-to-end runs of the harness against real store files.

#[path = "../common/mod.rs"]
mod common;

mod run;
mod scenarios;
mod startup;
mod stress;
