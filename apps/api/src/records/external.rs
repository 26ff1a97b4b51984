//! Draft extraction from pasted profile text.
//!
//! The generation backend reads up to three labelled sections and proposes
//! records. Drafts are returned to the caller for review and are never stored.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{strip_json_fences, TextGenerator};
use crate::records::models::{Category, RecordDraft};
use crate::records::prompts::{
    build_extraction_prompt, PROJECTS_HEADING, VOLUNTEERING_HEADING, WORK_HEADING,
};
use crate::records::validation::check_text;

pub const MAX_SECTION_CHARS: usize = 15_000;
const EXTRACTION_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Default, Deserialize)]
pub struct ExternalTextRequest {
    #[serde(default, alias = "experiences_text")]
    pub work_text: Option<String>,
    #[serde(default)]
    pub projects_text: Option<String>,
    #[serde(default)]
    pub volunteering_text: Option<String>,
}

impl ExternalTextRequest {
    /// Joins the non-blank sections under their headings.
    fn labelled_sections(&self) -> Result<String, AppError> {
        let sections = [
            ("work_text", WORK_HEADING, &self.work_text),
            ("projects_text", PROJECTS_HEADING, &self.projects_text),
            ("volunteering_text", VOLUNTEERING_HEADING, &self.volunteering_text),
        ];

        let mut labelled = Vec::new();
        for (field, heading, text) in sections {
            let Some(text) = text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            check_text(field, text, 1, MAX_SECTION_CHARS)?;
            labelled.push(format!("{heading}\n{text}"));
        }

        if labelled.is_empty() {
            return Err(AppError::Validation(
                "Paste text in at least one section".to_string(),
            ));
        }
        Ok(labelled.join("\n\n"))
    }
}

pub async fn parse_external_text(
    generator: &dyn TextGenerator,
    request: &ExternalTextRequest,
    timeout: Duration,
) -> Result<Vec<RecordDraft>, AppError> {
    let sections = request.labelled_sections()?;
    let prompt = build_extraction_prompt(&sections);

    let raw = generator
        .generate(&prompt, EXTRACTION_TEMPERATURE, timeout)
        .await?;
    let drafts = parse_drafts(&raw)?;
    info!("Extracted {} draft record(s) from pasted text", drafts.len());
    Ok(drafts)
}

/// Reads the model's JSON, accepting a bare object as a one-element array.
fn parse_drafts(raw: &str) -> Result<Vec<RecordDraft>, AppError> {
    let parsed: Value = serde_json::from_str(strip_json_fences(raw)).map_err(|e| {
        warn!("Extraction output is not JSON: {e}");
        AppError::Upstream(
            "Failed to parse the pasted text. Please try again or adjust the text.".to_string(),
        )
    })?;

    let entries = match parsed {
        Value::Array(entries) => entries,
        other => vec![other],
    };
    Ok(entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(normalize_draft)
        .collect())
}

fn normalize_draft(entry: &Value) -> RecordDraft {
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    RecordDraft {
        category: text("category")
            .or_else(|| text("type"))
            .map(Category::parse_lenient)
            .unwrap_or(Category::Work),
        title: text("title").unwrap_or("Untitled").to_string(),
        date_range: text("date_range").map(str::to_string),
        skills: entry
            .get("skills")
            .and_then(Value::as_array)
            .map(|skills| {
                skills
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        content: text("content").unwrap_or_default().to_string(),
    }
}
