//! Agent execution backends.
//!
//! The engine never talks to a model directly; every node call goes through
//! an [`AgentBackend`]. Two implementations ship with the crate:
//! [`MockBackend`] for deterministic offline runs and [`CommandBackend`],
//! which shells out to an external program. Which one a run uses is decided
//! by [`crate::config::BackendConfig`] via [`from_config`].

use super::{AgentReply, AgentRequest, Specialization};
use crate::config::{BackendConfig, SwarmConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Quality assumed when a backend does not report one.
pub const DEFAULT_QUALITY: f64 = 0.5;

/// The agent execution capability consumed by every node.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn execute(&self, request: &AgentRequest) -> Result<AgentReply>;
}

/// Build the backend selected by configuration.
pub fn from_config(config: &SwarmConfig) -> Result<Arc<dyn AgentBackend>> {
    match &config.backend {
        BackendConfig::Mock => Ok(Arc::new(MockBackend::new())),
        BackendConfig::Command { command } => Ok(Arc::new(
            CommandBackend::new(command)?.with_timeout(config.node_timeout()),
        )),
    }
}

/// Deterministic backend for demos and tests.
///
/// Responses are picked from the prompt's keywords, prefixed with the
/// node's specialization tag. Quality comes from a per-specialization table.
#[derive(Debug, Clone)]
pub struct MockBackend {
    quality: HashMap<Specialization, f64>,
    responses: HashMap<Specialization, String>,
    failing: HashSet<Specialization>,
    latency: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        let quality = HashMap::from([
            (Specialization::Io, 0.6),
            (Specialization::CoT, 0.75),
            (Specialization::ToT, 0.8),
        ]);
        Self {
            quality,
            responses: HashMap::new(),
            failing: HashSet::new(),
            latency: None,
        }
    }

    pub fn with_quality(mut self, specialization: Specialization, quality: f64) -> Self {
        self.quality.insert(specialization, quality);
        self
    }

    /// Fixed response for one specialization, bypassing keyword selection.
    pub fn with_response(mut self, specialization: Specialization, response: &str) -> Self {
        self.responses.insert(specialization, response.to_string());
        self
    }

    /// Every call from this specialization fails.
    pub fn failing_for(mut self, specialization: Specialization) -> Self {
        self.failing.insert(specialization);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn keyword_response(prompt: &str) -> &'static str {
        let lower = prompt.to_lowercase();
        if lower.contains("code") || lower.contains("python") {
            "```python\ndef solve_problem():\n    return result\n```"
        } else if lower.contains("research") || lower.contains("search") {
            "After researching the topic, I found the following key information."
        } else if lower.contains("creative") || lower.contains("story") {
            "Here's a creative approach to this challenge."
        } else if lower.contains("reason") || lower.contains("analysis") {
            "Based on my analysis, I need to break this down into logical steps."
        } else {
            "Combining all agent outputs, the final answer is ready."
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    async fn execute(&self, request: &AgentRequest) -> Result<AgentReply> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(&request.specialization) {
            return Err(Error::AgentExecution {
                id: request.node_id,
                message: format!("mock {} agent is configured to fail", request.specialization),
            });
        }
        let response = self
            .responses
            .get(&request.specialization)
            .map(String::as_str)
            .unwrap_or_else(|| Self::keyword_response(&request.prompt));
        let quality = self
            .quality
            .get(&request.specialization)
            .copied()
            .unwrap_or(0.7);
        Ok(AgentReply::new(
            format!("[{}] {}", request.specialization, response),
            quality,
        ))
    }
}

/// JSON shape a command may print instead of plain text.
#[derive(Debug, Deserialize)]
struct RawCommandReply {
    output: String,
    quality: Option<f64>,
}

/// Backend that runs an external command per agent call.
///
/// The framed prompt is passed as the last argument. Standard output is
/// parsed as `{"output": ..., "quality": ...}` when it is JSON, otherwise
/// taken verbatim with [`DEFAULT_QUALITY`].
#[derive(Debug, Clone)]
pub struct CommandBackend {
    binary: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandBackend {
    /// Default timeout for one agent call.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Resolve `command` (binary plus fixed arguments) on `PATH`.
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| Error::Validation("backend command is empty".to_string()))?;
        let binary = which::which(&program).map_err(|_| Error::BackendNotFound(program))?;
        Ok(Self::with_binary(binary, parts.collect()))
    }

    pub fn with_binary(binary: PathBuf, args: Vec<String>) -> Self {
        Self {
            binary,
            args,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn parse_reply(stdout: &str) -> Option<AgentReply> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<RawCommandReply>(trimmed) {
            Ok(raw) => Some(AgentReply::new(
                raw.output,
                raw.quality.unwrap_or(DEFAULT_QUALITY),
            )),
            Err(_) => Some(AgentReply::new(trimmed, DEFAULT_QUALITY)),
        }
    }
}

#[async_trait]
impl AgentBackend for CommandBackend {
    async fn execute(&self, request: &AgentRequest) -> Result<AgentReply> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .args(&self.args)
                .arg(&request.prompt)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout))?
        .map_err(Error::Io)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "command exited with code {}",
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::AgentExecution {
                id: request.node_id,
                message,
            });
        }

        Self::parse_reply(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            Error::AgentExecution {
                id: request.node_id,
                message: "command produced no output".to_string(),
            }
        })
    }
}
