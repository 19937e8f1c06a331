//! Lexical complexity estimation for incoming task descriptions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Keywords that mark multi-step analytical work.
static HIGH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(compar|analy[sz]|evaluat|synthesi[sz]|integrat|comprehensive)\w*").unwrap()
});

/// Keywords that mark explanatory work.
static MEDIUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(explain|describ|summari[sz]|overview|review)\w*").unwrap()
});

/// Keywords that mark simple lookups.
static LOW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(what|when|where|who|define|list)\b").unwrap());

/// Connectives that join several sub-requests.
static CONJUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(and|then|also|versus|vs|as well as|while)\b|;").unwrap()
});

static SKILL_RES: LazyLock<Vec<(Skill, Regex)>> = LazyLock::new(|| {
    vec![
        (Skill::Research, Regex::new(r"(?i)\b(search|find|research)\w*").unwrap()),
        (Skill::Analysis, Regex::new(r"(?i)\b(analy[sz]|compar)\w*").unwrap()),
        (Skill::Coding, Regex::new(r"(?i)\b(code|coding|program|algorithm)\w*").unwrap()),
        (Skill::Synthesis, Regex::new(r"(?i)\b(synthesi[sz]|combin|integrat)\w*").unwrap()),
        (Skill::Creativity, Regex::new(r"(?i)\b(creativ|design|innovat)\w*").unwrap()),
    ]
});

const LONG_TASK_WORDS: usize = 25;
const MEDIUM_TASK_WORDS: usize = 15;

/// Coarse task difficulty. Ordered: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    pub const ALL: [ComplexityLevel; 3] =
        [ComplexityLevel::Low, ComplexityLevel::Medium, ComplexityLevel::High];

    /// Team size before skill bonuses.
    pub fn base_team_size(&self) -> usize {
        match self {
            ComplexityLevel::Low => 2,
            ComplexityLevel::Medium => 3,
            ComplexityLevel::High => 4,
        }
    }

    /// Rough wall-clock budget for a task at this level.
    pub fn estimated_time_secs(&self) -> u64 {
        match self {
            ComplexityLevel::Low => 60,
            ComplexityLevel::Medium => 180,
            ComplexityLevel::High => 600,
        }
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityLevel::Low => write!(f, "low"),
            ComplexityLevel::Medium => write!(f, "medium"),
            ComplexityLevel::High => write!(f, "high"),
        }
    }
}

/// Capability a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Research,
    Analysis,
    Coding,
    Synthesis,
    Creativity,
}

/// Raw counts behind an estimate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexitySignals {
    pub high_keywords: usize,
    pub medium_keywords: usize,
    pub low_keywords: usize,
    pub conjunctions: usize,
    pub word_count: usize,
}

/// Complexity of one task, derived once and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskComplexity {
    pub level: ComplexityLevel,
    /// Confidence in `level`, in [0, 1].
    pub confidence: f64,
    pub skills: Vec<Skill>,
    pub signals: ComplexitySignals,
}

impl TaskComplexity {
    pub fn new(level: ComplexityLevel, confidence: f64) -> Self {
        Self {
            level,
            confidence: confidence.clamp(0.0, 1.0),
            skills: Vec::new(),
            signals: ComplexitySignals::default(),
        }
    }

    pub fn with_skills(mut self, skills: Vec<Skill>) -> Self {
        self.skills = skills;
        self
    }

    pub fn has_skill(&self, skill: Skill) -> bool {
        self.skills.contains(&skill)
    }
}

/// Rubric-based estimator: keyword groups, connectives and length.
///
/// Pure; the same description always yields the same estimate.
#[derive(Debug, Clone, Default)]
pub struct ComplexityEstimator;

impl ComplexityEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate(&self, description: &str) -> TaskComplexity {
        let signals = ComplexitySignals {
            high_keywords: HIGH_RE.find_iter(description).count(),
            medium_keywords: MEDIUM_RE.find_iter(description).count(),
            low_keywords: LOW_RE.find_iter(description).count(),
            conjunctions: CONJUNCTION_RE.find_iter(description).count(),
            word_count: description.split_whitespace().count(),
        };

        let long = signals.word_count > LONG_TASK_WORDS;
        let medium_length = signals.word_count > MEDIUM_TASK_WORDS && !long;
        let multi_part = signals.conjunctions >= 2;

        let level = if signals.high_keywords > 0 || (multi_part && long) {
            ComplexityLevel::High
        } else if signals.medium_keywords > 0
            || signals.conjunctions >= 1
            || signals.word_count > MEDIUM_TASK_WORDS
        {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        };

        let (agreeing, conflicting) = match level {
            ComplexityLevel::High => (
                signals.high_keywords + usize::from(multi_part) + usize::from(long),
                signals.low_keywords,
            ),
            ComplexityLevel::Medium => (
                signals.medium_keywords
                    + usize::from(signals.conjunctions >= 1)
                    + usize::from(medium_length),
                signals.low_keywords + usize::from(long),
            ),
            ComplexityLevel::Low => (
                signals.low_keywords
                    + usize::from(signals.word_count <= MEDIUM_TASK_WORDS)
                    + usize::from(signals.conjunctions == 0),
                0,
            ),
        };
        let confidence =
            (0.4 + 0.15 * agreeing as f64 - 0.1 * conflicting as f64).clamp(0.4, 0.95);

        let skills = SKILL_RES
            .iter()
            .filter(|(_, re)| re.is_match(description))
            .map(|(skill, _)| *skill)
            .collect();

        TaskComplexity {
            level,
            confidence,
            skills,
            signals,
        }
    }
}
