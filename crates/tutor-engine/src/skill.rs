//! Curriculum skills and the difficulty ladder.
//!
//! The curriculum is a closed set of nine Grade 1 math topics. Every skill
//! string crossing a serialization boundary must name one of them; unknown
//! names are rejected here and repaired or dropped by the caller.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Skill
// ============================================================================

/// One topic in the Grade 1 math curriculum.
///
/// Variants are declared in curriculum order; the derived `Ord` follows that
/// order and is used to break mastery ties during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Skill {
    /// Counting forward and backward within 120.
    CountingWithin120,
    /// Tens and ones in two-digit numbers.
    PlaceValueTensOnes,
    /// Addition facts within 20.
    AddWithin20,
    /// Subtraction facts within 20.
    SubtractWithin20,
    /// One-step addition and subtraction word problems.
    WordProblemsAddSub,
    /// Telling time to the hour and half hour.
    TimeToHalfHour,
    /// Comparing and measuring lengths.
    MeasurementLength,
    /// Attributes of two- and three-dimensional shapes.
    ShapesAttributes,
    /// Partitioning shapes into halves and quarters.
    FractionsHalvesQuarters,
}

impl Skill {
    /// Every skill, in curriculum order.
    pub const ALL: [Self; 9] = [
        Self::CountingWithin120,
        Self::PlaceValueTensOnes,
        Self::AddWithin20,
        Self::SubtractWithin20,
        Self::WordProblemsAddSub,
        Self::TimeToHalfHour,
        Self::MeasurementLength,
        Self::ShapesAttributes,
        Self::FractionsHalvesQuarters,
    ];

    /// Returns the wire name of this skill.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_engine::Skill;
    ///
    /// assert_eq!(Skill::AddWithin20.as_str(), "add_within_20");
    /// ```
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CountingWithin120 => "counting_within_120",
            Self::PlaceValueTensOnes => "place_value_tens_ones",
            Self::AddWithin20 => "add_within_20",
            Self::SubtractWithin20 => "subtract_within_20",
            Self::WordProblemsAddSub => "word_problems_add_sub",
            Self::TimeToHalfHour => "time_to_half_hour",
            Self::MeasurementLength => "measurement_length",
            Self::ShapesAttributes => "shapes_attributes",
            Self::FractionsHalvesQuarters => "fractions_halves_quarters",
        }
    }

    /// Returns a human-readable label (wire name with spaces).
    #[must_use]
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Parses a wire name into a `Skill`.
    ///
    /// Returns `None` for anything outside the curriculum.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a skill name outside the curriculum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown skill '{0}'")]
pub struct UnknownSkill(pub String);

impl FromStr for Skill {
    type Err = UnknownSkill;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownSkill(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Skill {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Skill {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Difficulty
// ============================================================================

/// A question difficulty on the 1 to 10 ladder.
///
/// The value is clamped on construction, so a `Difficulty` can never leave
/// the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Difficulty(u8);

impl Difficulty {
    /// Easiest rung.
    pub const MIN: Self = Self(1);
    /// Hardest rung.
    pub const MAX: Self = Self(10);
    /// Starting difficulty for a fresh learner.
    pub const START: Self = Self(4);

    /// Creates a difficulty, clamping `value` into `[1, 10]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_engine::Difficulty;
    ///
    /// assert_eq!(Difficulty::new(0).get(), 1);
    /// assert_eq!(Difficulty::new(7).get(), 7);
    /// assert_eq!(Difficulty::new(42).get(), 10);
    /// ```
    #[must_use]
    pub fn new(value: i64) -> Self {
        let clamped = value.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0));
        // In range after the clamp above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(clamped as u8)
    }

    /// Creates a difficulty from an arbitrary JSON-style number.
    ///
    /// The value is rounded to the nearest integer and clamped. Returns `None`
    /// for NaN and infinities.
    #[must_use]
    pub fn from_number(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let rounded = value.round().clamp(f64::from(Self::MIN.0), f64::from(Self::MAX.0));
        // Finite and within [1, 10] after the clamp above.
        #[allow(clippy::cast_possible_truncation)]
        Some(Self::new(rounded as i64))
    }

    /// Returns the numeric rung.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the next rung up, saturating at the top.
    #[must_use]
    pub fn raise(self) -> Self {
        Self(self.0.saturating_add(1).min(Self::MAX.0))
    }

    /// Returns the next rung down, saturating at the bottom.
    #[must_use]
    pub fn lower(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::MIN.0))
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::START
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Self::from_number(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid difficulty '{raw}'")))
    }
}
