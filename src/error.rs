use thiserror::Error;

use crate::agent::AgentId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Node not found: {id}")]
    UnknownNode { id: AgentId },

    #[error("Edge not found: {src} -> {dst}")]
    UnknownEdge { src: AgentId, dst: AgentId },

    #[error("Edge {src} -> {dst} would create a cycle")]
    Cycle { src: AgentId, dst: AgentId },

    #[error("Cycle detected in coordination graph at node {id}")]
    CycleDetected { id: AgentId },

    #[error("Node {id} still has {edges} edge(s)")]
    NodeInUse { id: AgentId, edges: usize },

    #[error("Edge weight {weight} is outside [0, 1]")]
    InvalidWeight { weight: f64 },

    #[error("Coordination graph has no nodes")]
    EmptyGraph,

    #[error("Agent {id} execution failed: {message}")]
    AgentExecution { id: AgentId, message: String },

    #[error("Agent backend not found: {0}")]
    BackendNotFound(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },
}

impl Error {
    /// Structural violations are rejected by the graph and never abort an optimizer run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::UnknownNode { .. }
                | Error::UnknownEdge { .. }
                | Error::Cycle { .. }
                | Error::CycleDetected { .. }
                | Error::NodeInUse { .. }
                | Error::InvalidWeight { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
