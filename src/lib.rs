//! Graph-based multi-agent coordination.
//!
//! Agents are nodes of a weighted DAG ([`graph::CoordinationGraph`]). A
//! [`executor::GraphExecutor`] runs the graph layer by layer and scores the
//! merged output, and a [`optimizer::TopologyOptimizer`] hill-climbs the
//! topology against a task batch. [`swarm::Swarm`] ties this together with
//! complexity estimation and team planning.

pub mod agent;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod log;
pub mod optimizer;
pub mod planning;
pub mod rubric;
pub mod swarm;

pub use error::{Error, Result};
