//! Integration test suite for swarm.
//!
//! These tests drive the public API end to end: graph invariants under
//! random mutation, execution with failing agents, optimizer runs, team
//! planning and snapshot restore.
//!
//! # Test Categories
//!
//! - `graph_properties`: Acyclicity and ordering under random edits
//! - `execution`: Routing, merging and partial failure
//! - `optimizer_e2e`: Full optimization runs
//! - `planning`: Complexity estimation and team formation
//! - `snapshots`: Reporting snapshots and restore
//!
//! # CI Compatibility
//!
//! Every backend here is in-process; no external command or model is called.

mod fixtures;

mod graph_properties;
mod execution;
mod planning;
mod snapshots;
