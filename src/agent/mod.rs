//! Agents: the nodes of a coordination graph.
//!
//! An [`AgentNode`] pairs an immutable identity and a reasoning
//! [`Specialization`] with the backend that actually produces output.
//! Nodes are shared as `Arc<AgentNode>` between a live graph and its
//! trial clones, so nothing here is mutable after construction.

mod backend;

pub use backend::{from_config, AgentBackend, CommandBackend, MockBackend, DEFAULT_QUALITY};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for an agent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AgentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Reasoning strategy an agent applies to its input.
///
/// Serialized as a plain string: `IO`, `CoT`, `ToT`, or the custom role name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Specialization {
    /// Direct input/output answering.
    Io,
    /// Chain-of-thought.
    CoT,
    /// Tree-of-thought.
    ToT,
    /// Free-form role such as `critic` or `creative`.
    Custom(String),
}

impl Specialization {
    /// Specializations the node mutation family swaps between.
    pub const PALETTE: [Specialization; 3] =
        [Specialization::Io, Specialization::CoT, Specialization::ToT];

    pub fn custom(role: &str) -> Self {
        Self::from(role.to_string())
    }

    /// Wrap the node input in the instructions for this strategy.
    pub fn frame(&self, input: &str) -> String {
        match self {
            Specialization::Io => format!("Answer the task directly.\n\n{}", input),
            Specialization::CoT => format!(
                "Reason step by step, then state the answer.\n\n{}",
                input
            ),
            Specialization::ToT => format!(
                "Explore several candidate lines of thought, evaluate each, \
                 and keep the most promising one.\n\n{}",
                input
            ),
            Specialization::Custom(role) => {
                format!("Act as the team's {}. Contribute from that perspective.\n\n{}", role, input)
            }
        }
    }
}

impl std::fmt::Display for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Specialization::Io => write!(f, "IO"),
            Specialization::CoT => write!(f, "CoT"),
            Specialization::ToT => write!(f, "ToT"),
            Specialization::Custom(role) => write!(f, "{}", role),
        }
    }
}

impl From<String> for Specialization {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "io" => Specialization::Io,
            "cot" => Specialization::CoT,
            "tot" => Specialization::ToT,
            other => Specialization::Custom(other.to_string()),
        }
    }
}

impl From<Specialization> for String {
    fn from(s: Specialization) -> Self {
        s.to_string()
    }
}

/// What a node asks its backend to do.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub node_id: AgentId,
    pub specialization: Specialization,
    /// Input after merging predecessor contributions.
    pub input: String,
    /// `input` framed for the node's strategy.
    pub prompt: String,
}

/// Backend answer: candidate output plus a self-reported quality in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub output: String,
    #[serde(default = "default_quality")]
    pub quality: f64,
}

fn default_quality() -> f64 {
    DEFAULT_QUALITY
}

impl AgentReply {
    pub fn new(output: impl Into<String>, quality: f64) -> Self {
        Self {
            output: output.into(),
            quality,
        }
    }
}

/// One reasoning agent in a coordination graph.
pub struct AgentNode {
    id: AgentId,
    specialization: Specialization,
    backend: Arc<dyn AgentBackend>,
}

impl AgentNode {
    pub fn new(specialization: Specialization, backend: Arc<dyn AgentBackend>) -> Self {
        Self::with_id(AgentId::new(), specialization, backend)
    }

    /// Rebuild a node with a known identity (snapshot restore).
    pub fn with_id(
        id: AgentId,
        specialization: Specialization,
        backend: Arc<dyn AgentBackend>,
    ) -> Self {
        Self {
            id,
            specialization,
            backend,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn specialization(&self) -> &Specialization {
        &self.specialization
    }

    pub fn backend(&self) -> &Arc<dyn AgentBackend> {
        &self.backend
    }

    /// A node `id` with another specialization on the same backend.
    pub fn respecialized(&self, id: AgentId, specialization: Specialization) -> Self {
        Self::with_id(id, specialization, Arc::clone(&self.backend))
    }

    /// Run this agent on `input`.
    ///
    /// Quality reported by the backend is clamped into [0, 1]; a non-finite
    /// quality is treated as zero.
    pub async fn execute(&self, input: &str) -> Result<AgentReply> {
        let request = AgentRequest {
            node_id: self.id,
            specialization: self.specialization.clone(),
            input: input.to_string(),
            prompt: self.specialization.frame(input),
        };
        let mut reply = self.backend.execute(&request).await?;
        reply.quality = if reply.quality.is_finite() {
            reply.quality.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(reply)
    }
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("id", &self.id.short())
            .field("specialization", &self.specialization)
            .finish()
    }
}
