//! Questions: repair of generator output, local fallbacks and answer judging.
//!
//! The engine treats question content as opaque. It only fills in or clamps
//! the routing fields (`skill`, `difficulty`, `format`) so a generated
//! question always fits the target it was requested for.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TutorError};
use crate::selector::Target;
use crate::skill::{Difficulty, Skill};

/// Number of choices a multiple-choice question must carry.
pub const CHOICE_COUNT: usize = 4;

/// How a question expects to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionFormat {
    /// Pick one of exactly four choices.
    MultipleChoice,
    /// Type a number.
    Numeric,
    /// Type free text.
    FreeResponse,
}

impl QuestionFormat {
    /// Parses a wire name, returning `None` for anything unrecognised.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "multiple_choice" => Some(Self::MultipleChoice),
            "numeric" => Some(Self::Numeric),
            "free_response" => Some(Self::FreeResponse),
            _ => None,
        }
    }
}

/// A question ready to be shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier assigned by whoever produced the question.
    pub id: String,
    /// Skill the question exercises.
    pub skill: Skill,
    /// Difficulty on the 1 to 10 ladder.
    pub difficulty: Difficulty,
    /// Answer format.
    pub format: QuestionFormat,
    /// The question text.
    pub stem: String,
    /// Exactly four choices for multiple-choice questions, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    /// The expected answer, compared after trimming.
    pub correct_answer: String,
    /// Shown to the learner after answering.
    pub explanation: String,
}

impl Question {
    /// Returns `true` if `raw` matches the correct answer after trimming.
    #[must_use]
    pub fn judge(&self, raw: &str) -> bool {
        judge_answer(raw, &self.correct_answer)
    }

    /// The skill and difficulty this question targets.
    #[must_use]
    pub const fn target(&self) -> Target {
        Target {
            skill: self.skill,
            difficulty: self.difficulty,
        }
    }
}

/// Compares an answer against the expected one.
///
/// Exact string equality after trimming both sides. No numeric parsing and
/// no case folding.
///
/// # Examples
///
/// ```
/// use tutor_engine::judge_answer;
///
/// assert!(judge_answer(" 16 ", "16"));
/// assert!(!judge_answer("sixteen", "16"));
/// ```
#[must_use]
pub fn judge_answer(raw: &str, correct_answer: &str) -> bool {
    raw.trim() == correct_answer.trim()
}

// ============================================================================
// Repair
// ============================================================================

/// Turns a raw generator response into a [`Question`] for `target`.
///
/// Missing or unusable `skill`, `difficulty` and `format` fields are filled
/// from the target; a multiple-choice question without exactly four choices
/// is downgraded to free response.
///
/// # Errors
///
/// Returns [`TutorError::MalformedQuestion`] when `raw` is not an object or
/// lacks a string `id` or `stem`.
pub fn repair(raw: &Value, target: Target) -> Result<Question> {
    let Some(obj) = raw.as_object() else {
        return Err(TutorError::malformed_question("response is not a JSON object"));
    };

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TutorError::malformed_question("missing string 'id'"))?;
    let stem = obj
        .get("stem")
        .and_then(Value::as_str)
        .ok_or_else(|| TutorError::malformed_question("missing string 'stem'"))?;

    let skill = obj
        .get("skill")
        .and_then(Value::as_str)
        .and_then(Skill::from_name)
        .unwrap_or(target.skill);

    let difficulty = obj
        .get("difficulty")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .and_then(Difficulty::from_number)
        .unwrap_or(target.difficulty);

    let choices: Option<Vec<String>> = obj
        .get("choices")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(stringify).collect());

    let mut format = obj
        .get("format")
        .and_then(Value::as_str)
        .and_then(QuestionFormat::from_name)
        .unwrap_or(if choices.is_some() {
            QuestionFormat::MultipleChoice
        } else {
            QuestionFormat::Numeric
        });

    let choices = match format {
        QuestionFormat::MultipleChoice => match choices {
            Some(c) if c.len() == CHOICE_COUNT => Some(c),
            _ => {
                format = QuestionFormat::FreeResponse;
                None
            }
        },
        QuestionFormat::Numeric | QuestionFormat::FreeResponse => None,
    };

    Ok(Question {
        id: id.to_string(),
        skill,
        difficulty,
        format,
        stem: stem.to_string(),
        choices,
        correct_answer: obj.get("correct_answer").map(stringify).unwrap_or_default(),
        explanation: obj.get("explanation").map(stringify).unwrap_or_default(),
    })
}

/// Renders a JSON value as answer text.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a generator body as JSON, falling back to the outermost `{ ... }`
/// span when the body wraps the object in prose.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

// ============================================================================
// Fallback
// ============================================================================

/// Builds a local placeholder question for `target`.
///
/// Pure and offline; used whenever the generator fails or is not configured.
#[must_use]
pub fn fallback_question(target: Target, request_id: u64) -> Question {
    let id = format!("local-{request_id}");
    let choices = |items: [&str; CHOICE_COUNT]| -> Option<Vec<String>> {
        Some(items.iter().map(ToString::to_string).collect())
    };

    let (skill, format, stem, choices, correct_answer, explanation) = match target.skill {
        Skill::AddWithin20 => (
            Skill::AddWithin20,
            QuestionFormat::MultipleChoice,
            "Lila has 9 stickers. She gets 7 more. How many stickers now?",
            choices(["15", "16", "17", "18"]),
            "16",
            "9 + 7 = 16. You can make 10 by adding 1 to 9, then 6 more makes 16.",
        ),
        Skill::SubtractWithin20 => (
            Skill::SubtractWithin20,
            QuestionFormat::Numeric,
            "What is 14 − 6?",
            None,
            "8",
            "Take away 6 from 14 to get 8.",
        ),
        Skill::PlaceValueTensOnes => (
            Skill::PlaceValueTensOnes,
            QuestionFormat::MultipleChoice,
            "Which shows the number 34?",
            choices([
                "3 tens and 4 ones",
                "4 tens and 3 ones",
                "30 ones and 4 tens",
                "34 tens",
            ]),
            "3 tens and 4 ones",
            "34 has 3 tens (30) and 4 ones.",
        ),
        Skill::CountingWithin120 => (
            Skill::CountingWithin120,
            QuestionFormat::Numeric,
            "What number comes after 19?",
            None,
            "20",
            "Counting by ones: 19, then 20.",
        ),
        other => (
            other,
            QuestionFormat::Numeric,
            "What is 8 + 6?",
            None,
            "14",
            "Add 8 and 6 to make 14.",
        ),
    };

    Question {
        id,
        skill,
        difficulty: target.difficulty,
        format,
        stem: stem.to_string(),
        choices,
        correct_answer: correct_answer.to_string(),
        explanation: explanation.to_string(),
    }
}
