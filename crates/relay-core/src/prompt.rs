//! Course records and the prompt text built from a course selection.

use serde::{Deserialize, Serialize};

/// Fewest courses a generation request may combine.
pub const MIN_COURSES: usize = 2;
/// Most courses a generation request may combine.
pub const MAX_COURSES: usize = 4;

const INSTRUCTION: &str = "Based on the rationales of the following courses, write only 2-4 \
sentences expressing possible intellectual, conceptual or applied connections between their \
fields of knowledge. Keep the language academic, fluent and concise.";

/// The subset of a catalog record the prompt needs.
///
/// Field names follow the catalog's column headers; any other columns in the
/// source record are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "CourseID", default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(rename = "CourseName")]
    pub course_name: String,
    #[serde(rename = "RationaleAbstract", default)]
    pub rationale_abstract: String,
}

impl Course {
    pub fn new(name: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            course_id: None,
            course_name: name.into(),
            rationale_abstract: rationale.into(),
        }
    }
}

/// Whether a selection of `count` courses may be sent for generation.
pub fn can_generate(count: usize) -> bool {
    (MIN_COURSES..=MAX_COURSES).contains(&count)
}

/// Render the generation prompt for a course selection.
///
/// Pure formatting: callers check [`can_generate`] first.
pub fn build_prompt(courses: &[Course]) -> String {
    let mut prompt = String::with_capacity(INSTRUCTION.len() + courses.len() * 256);
    prompt.push_str(INSTRUCTION);
    prompt.push_str("\n\n");

    for (index, course) in courses.iter().enumerate() {
        prompt.push_str(&format!("--- Course {} ---\n", index + 1));
        prompt.push_str(&format!("Course name: {}\n", course.course_name));
        prompt.push_str(&format!(
            "Rationale and abstract: {}\n\n",
            course.rationale_abstract
        ));
    }

    prompt
}
