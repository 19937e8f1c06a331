//! Task samples and the scoring rubrics applied to graph outputs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One evaluation task: the input handed to entry nodes plus the criteria a
/// rubric checks the final output against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSample {
    pub input: String,
    #[serde(default)]
    pub criteria: Vec<String>,
}

impl TaskSample {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            criteria: Vec::new(),
        }
    }

    pub fn with_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria = criteria.into_iter().map(Into::into).collect();
        self
    }
}

/// Scores a final output against a task. Scores live in [0, 1].
pub trait EvaluationRubric: Send + Sync {
    fn score(&self, output: &str, task: &TaskSample) -> Result<f64>;
}

/// Fraction of the task's criteria terms found in the output,
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct KeywordRubric;

impl KeywordRubric {
    pub fn new() -> Self {
        Self
    }
}

impl EvaluationRubric for KeywordRubric {
    fn score(&self, output: &str, task: &TaskSample) -> Result<f64> {
        if task.criteria.is_empty() {
            return Err(Error::Evaluation(format!(
                "task '{}' has no criteria",
                task.input
            )));
        }
        let haystack = output.to_lowercase();
        let hits = task
            .criteria
            .iter()
            .filter(|term| haystack.contains(&term.to_lowercase()))
            .count();
        Ok(hits as f64 / task.criteria.len() as f64)
    }
}
