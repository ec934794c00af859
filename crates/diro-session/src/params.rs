//! Generation parameters and the rules deciding which optional fields apply.
//!
//! [`GenerationForm`] is the mutable form a collector edits field by field.
//! Its setters keep the dependent fields consistent (stream only for senior
//! grades, no difficulty for lesson plans). [`GenerationForm::validate`]
//! produces the immutable [`GenerationParams`] snapshot a session runs with.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DiroError, Result};

/// Grade labels offered by the form.
pub const GRADES: [&str; 12] = [
    "Grade 1", "Grade 2", "Grade 3", "Grade 4", "Grade 5", "Grade 6", "Grade 7", "Grade 8",
    "Grade 9", "Grade 10", "Grade 11", "Grade 12",
];

/// Stream tracks available to grades 11 and 12.
pub const STREAMS: [&str; 4] = [
    "Science",
    "Commerce with Maths",
    "Commerce without Maths",
    "Humanities",
];

/// Material types the backend can generate.
pub const MATERIAL_TYPES: [&str; 3] = ["Question paper", "Worksheet", "Lesson Plan"];

/// Difficulty levels for question papers and worksheets.
pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

/// Difficulty restored when leaving "lesson plan" with nothing selected.
pub const DEFAULT_DIFFICULTY: &str = "easy";

/// Matches `11`, `Grade 11`, `grade11`.
static GRADE_LABEL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:grade\s*)?(\d{1,2})\s*$").ok());

// ============================================================================
// Derived fields
// ============================================================================

/// Extracts the numeric grade from a bare (`"11"`) or prefixed (`"Grade 11"`) label.
///
/// # Examples
///
/// ```
/// use diro_session::params::grade_number;
///
/// assert_eq!(grade_number("Grade 11"), Some(11));
/// assert_eq!(grade_number("7"), Some(7));
/// assert_eq!(grade_number("Kindergarten"), None);
/// ```
#[must_use]
pub fn grade_number(grade: &str) -> Option<u8> {
    let re = (*GRADE_LABEL).as_ref()?;
    re.captures(grade)?.get(1)?.as_str().parse().ok()
}

/// Returns `true` if the grade requires a stream track (grades 11 and 12).
#[must_use]
pub fn needs_stream(grade: &str) -> bool {
    matches!(grade_number(grade), Some(11 | 12))
}

fn material_is(material_type: &str, expected: &str) -> bool {
    material_type.trim().eq_ignore_ascii_case(expected)
}

/// Returns `true` if the material type is a question paper.
///
/// The comparison ignores case and surrounding whitespace.
#[must_use]
pub fn is_question_paper(material_type: &str) -> bool {
    material_is(material_type, "question paper")
}

/// Returns `true` if the material type is a lesson plan.
#[must_use]
pub fn is_lesson_plan(material_type: &str) -> bool {
    material_is(material_type, "lesson plan")
}

// ============================================================================
// GenerationForm
// ============================================================================

/// Editable form state collected from the user.
///
/// Setters apply the dependent-field rules immediately so that the form is
/// always internally consistent; only [`validate`](Self::validate) decides
/// whether it is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationForm {
    grade: String,
    chapter: String,
    material_type: String,
    difficulty: String,
    stream: Option<String>,
    max_marks: Option<u32>,
}

impl Default for GenerationForm {
    fn default() -> Self {
        Self {
            grade: GRADES[0].to_string(),
            chapter: String::new(),
            material_type: MATERIAL_TYPES[0].to_string(),
            difficulty: DEFAULT_DIFFICULTY.to_string(),
            stream: None,
            max_marks: None,
        }
    }
}

impl GenerationForm {
    /// Creates a form with the default selections and an empty chapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the grade, dropping the stream if the new grade has none.
    pub fn set_grade(&mut self, grade: impl Into<String>) -> &mut Self {
        self.grade = grade.into();
        if !needs_stream(&self.grade) {
            self.stream = None;
        }
        self
    }

    /// Sets the chapter or topic.
    pub fn set_chapter(&mut self, chapter: impl Into<String>) -> &mut Self {
        self.chapter = chapter.into();
        self
    }

    /// Sets the material type.
    ///
    /// Choosing a lesson plan clears the difficulty; choosing anything else
    /// with no difficulty selected restores [`DEFAULT_DIFFICULTY`].
    pub fn set_material_type(&mut self, material_type: impl Into<String>) -> &mut Self {
        self.material_type = material_type.into();
        if is_lesson_plan(&self.material_type) {
            self.difficulty.clear();
        } else if self.difficulty.is_empty() {
            self.difficulty = DEFAULT_DIFFICULTY.to_string();
        }
        self
    }

    /// Sets the difficulty. Ignored while the material type is a lesson plan.
    pub fn set_difficulty(&mut self, difficulty: impl Into<String>) -> &mut Self {
        if !is_lesson_plan(&self.material_type) {
            self.difficulty = difficulty.into();
        }
        self
    }

    /// Sets or clears the stream. Ignored for grades without streams.
    pub fn set_stream(&mut self, stream: Option<String>) -> &mut Self {
        self.stream = stream
            .filter(|s| !s.trim().is_empty())
            .filter(|_| needs_stream(&self.grade));
        self
    }

    /// Sets or clears the maximum marks.
    pub fn set_max_marks(&mut self, max_marks: Option<u32>) -> &mut Self {
        self.max_marks = max_marks;
        self
    }

    /// The selected grade label.
    #[must_use]
    pub fn grade(&self) -> &str {
        &self.grade
    }

    /// The chapter as typed.
    #[must_use]
    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    /// The selected material type.
    #[must_use]
    pub fn material_type(&self) -> &str {
        &self.material_type
    }

    /// The selected difficulty; empty for lesson plans.
    #[must_use]
    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    /// The selected stream, if any.
    #[must_use]
    pub fn stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    /// The entered maximum marks, if any.
    #[must_use]
    pub const fn max_marks(&self) -> Option<u32> {
        self.max_marks
    }

    /// Whether the stream field is shown and required.
    #[must_use]
    pub fn needs_stream(&self) -> bool {
        needs_stream(&self.grade)
    }

    /// Whether the max-marks field is shown and required.
    #[must_use]
    pub fn needs_max_marks(&self) -> bool {
        is_question_paper(&self.material_type)
    }

    /// Whether the difficulty field is shown.
    #[must_use]
    pub fn needs_difficulty(&self) -> bool {
        !is_lesson_plan(&self.material_type)
    }

    /// Checks the gating rules and snapshots the parameters.
    ///
    /// Fields that do not apply to the current selection (a stream below
    /// grade 11, max-marks for anything but a question paper) are left out of
    /// the snapshot even if set.
    ///
    /// # Errors
    ///
    /// Returns `DiroError::InvalidParameter` naming the first missing or
    /// out-of-range field.
    pub fn validate(&self) -> Result<GenerationParams> {
        if self.grade.trim().is_empty() {
            return Err(DiroError::invalid_parameter("grade", "a grade is required"));
        }

        let chapter = self.chapter.trim();
        if chapter.is_empty() {
            return Err(DiroError::invalid_parameter(
                "chapter",
                "a chapter is required",
            ));
        }

        if self.material_type.trim().is_empty() {
            return Err(DiroError::invalid_parameter(
                "material type",
                "a material type is required",
            ));
        }

        if self.needs_difficulty() && self.difficulty.trim().is_empty() {
            return Err(DiroError::invalid_parameter(
                "difficulty",
                format!("a difficulty is required for a {}", self.material_type),
            ));
        }

        let max_marks = if self.needs_max_marks() {
            match self.max_marks {
                Some(marks) if marks >= 1 => Some(marks),
                Some(_) => {
                    return Err(DiroError::invalid_parameter(
                        "max marks",
                        "maximum marks must be at least 1",
                    ))
                }
                None => {
                    return Err(DiroError::invalid_parameter(
                        "max marks",
                        "maximum marks are required for a question paper",
                    ))
                }
            }
        } else {
            None
        };

        let stream = if self.needs_stream() {
            match &self.stream {
                Some(stream) => Some(stream.clone()),
                None => {
                    return Err(DiroError::invalid_parameter(
                        "stream",
                        format!("a stream is required for {}", self.grade),
                    ))
                }
            }
        } else {
            None
        };

        Ok(GenerationParams {
            grade: self.grade.clone(),
            chapter: chapter.to_string(),
            material_type: self.material_type.clone(),
            difficulty: self.difficulty.clone(),
            stream,
            max_marks,
        })
    }
}

// ============================================================================
// GenerationParams
// ============================================================================

/// Immutable parameter snapshot for one generation session.
///
/// Only [`GenerationForm::validate`] constructs these outside of
/// deserialization, so a value in hand has passed the gating rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    grade: String,
    chapter: String,
    material_type: String,
    difficulty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_marks: Option<u32>,
}

impl GenerationParams {
    /// The grade label.
    #[must_use]
    pub fn grade(&self) -> &str {
        &self.grade
    }

    /// The trimmed chapter.
    #[must_use]
    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    /// The material type.
    #[must_use]
    pub fn material_type(&self) -> &str {
        &self.material_type
    }

    /// The difficulty; empty for lesson plans.
    #[must_use]
    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    /// The stream, present only for grades that need one.
    #[must_use]
    pub fn stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    /// Maximum marks, present only for question papers.
    #[must_use]
    pub const fn max_marks(&self) -> Option<u32> {
        self.max_marks
    }

    /// Builds the wire request for the generation endpoint.
    #[must_use]
    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            grade: self.grade.clone(),
            chapter: self.chapter.clone(),
            material_type: self.material_type.clone(),
            difficulty: self.difficulty.clone(),
            stream: self.stream.clone(),
            max_marks: self.max_marks,
        }
    }

    /// Composes the final result text: a header echoing the request followed
    /// by the generated payload.
    #[must_use]
    pub fn compose_result(&self, output: &str) -> String {
        format!("Generated {} ({self})\n\n{output}", self.material_type)
    }
}

impl fmt::Display for GenerationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grade: {}", self.grade)?;
        if let Some(stream) = &self.stream {
            write!(f, ", Stream: {stream}")?;
        }
        write!(
            f,
            ", Chapter: {}, Difficulty: {}",
            self.chapter, self.difficulty
        )?;
        if let Some(marks) = self.max_marks {
            write!(f, ", Max Marks: {marks}")?;
        }
        Ok(())
    }
}

// ============================================================================
// GenerationRequest
// ============================================================================

/// Query parameters sent to `GET /api/generate_stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Grade label.
    pub grade: String,
    /// Chapter or topic.
    pub chapter: String,
    /// Material type.
    pub material_type: String,
    /// Difficulty; empty for lesson plans.
    pub difficulty: String,
    /// Stream for senior grades.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    /// Maximum marks for question papers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_marks: Option<u32>,
}

impl GenerationRequest {
    /// Returns the request as ordered query pairs, omitting absent fields.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("grade", self.grade.clone()),
            ("chapter", self.chapter.clone()),
            ("material_type", self.material_type.clone()),
            ("difficulty", self.difficulty.clone()),
        ];
        if let Some(stream) = &self.stream {
            pairs.push(("stream", stream.clone()));
        }
        if let Some(marks) = self.max_marks {
            pairs.push(("max_marks", marks.to_string()));
        }
        pairs
    }
}

// ============================================================================
// Tests
// ============================================================================
