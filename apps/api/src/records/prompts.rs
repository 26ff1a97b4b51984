// Prompt for turning pasted profile text into draft records.

use crate::llm_client::prompts::{delimit, DATA_ONLY_INSTRUCTION};

pub const PROFILE_TEXT_TAG: &str = "profile_text";

pub const WORK_HEADING: &str = "=== WORK EXPERIENCE ===";
pub const PROJECTS_HEADING: &str = "=== PROJECTS ===";
pub const VOLUNTEERING_HEADING: &str = "=== VOLUNTEERING ===";

pub fn build_extraction_prompt(labelled_sections: &str) -> String {
    let profile = delimit(PROFILE_TEXT_TAG, labelled_sections);
    let data_only = DATA_ONLY_INSTRUCTION;

    format!(
        r#"You are a structured data extractor. Parse the following profile text into a JSON array of experiences.

{data_only}

For each experience entry you find, extract:
- "category": one of "work", "project", or "volunteering" based on which section it came from
- "title": the role or project title and the company or organization (e.g. "Software Engineer at Acme")
- "date_range": the date range if present (e.g. "Jan 2020 - Present"), or null if not found
- "skills": an array of skills and technologies mentioned in the description
- "content": the full description text of the experience

Rules:
- Return ONLY a valid JSON array, no other text
- Each entry in the array is an object with the fields above
- If a section has multiple entries, create a separate object for each
- Do not invent information that is not present in the text
- If skills are not stated explicitly, infer them from the tools and technologies the description mentions

{profile}

Return ONLY the JSON array:"#
    )
}
