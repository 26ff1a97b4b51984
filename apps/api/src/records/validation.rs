//! Field bounds for record payloads. Every violation is user-fixable, so all of
//! them surface as `AppError::Validation`.

use std::collections::HashSet;

use crate::errors::AppError;
use crate::records::models::RecordInput;

pub const MAX_ID_CHARS: usize = 100;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DATE_RANGE_CHARS: usize = 100;
pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const MAX_SKILLS: usize = 30;
pub const MAX_INDUSTRY: usize = 10;
pub const MAX_TAGS: usize = 20;
pub const MAX_LIST_ITEM_CHARS: usize = 100;
pub const MAX_BATCH_RECORDS: usize = 25;

pub fn validate_record_id(id: &str) -> Result<(), AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::Validation("id cannot be empty".to_string()));
    }
    if id.chars().count() > MAX_ID_CHARS {
        return Err(AppError::Validation(format!(
            "id must be at most {MAX_ID_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_record_input(input: &RecordInput) -> Result<(), AppError> {
    if let Some(id) = &input.id {
        validate_record_id(id)?;
    }
    check_text("title", &input.title, 1, MAX_TITLE_CHARS)?;
    if let Some(date_range) = &input.date_range {
        check_text("date_range", date_range, 0, MAX_DATE_RANGE_CHARS)?;
    }
    check_text("content", &input.content, 1, MAX_CONTENT_CHARS)?;
    check_list("skills", &input.skills, MAX_SKILLS)?;
    check_list("industry", &input.industry, MAX_INDUSTRY)?;
    check_list("tags", &input.tags, MAX_TAGS)?;
    Ok(())
}

/// Validates a batch as a unit: size bounds, each record, and id uniqueness
/// within the batch.
pub fn validate_batch(inputs: &[RecordInput]) -> Result<(), AppError> {
    if inputs.is_empty() {
        return Err(AppError::Validation("No records provided".to_string()));
    }
    if inputs.len() > MAX_BATCH_RECORDS {
        return Err(AppError::Validation(format!(
            "A batch may contain at most {MAX_BATCH_RECORDS} records"
        )));
    }
    let mut seen = HashSet::new();
    for (i, input) in inputs.iter().enumerate() {
        validate_record_input(input)
            .map_err(|e| AppError::Validation(format!("record {i}: {}", e.public_message())))?;
        if let Some(id) = &input.id {
            if !seen.insert(id.trim()) {
                return Err(AppError::Validation(format!(
                    "record {i}: duplicate id '{}' in batch",
                    id.trim()
                )));
            }
        }
    }
    Ok(())
}

/// Checks the trimmed length of a text field, in characters.
pub fn check_text(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    if len > max {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn check_list(field: &str, items: &[String], max_items: usize) -> Result<(), AppError> {
    if items.len() > max_items {
        return Err(AppError::Validation(format!(
            "{field} may contain at most {max_items} entries"
        )));
    }
    for item in items {
        check_text(field, item, 1, MAX_LIST_ITEM_CHARS)?;
    }
    Ok(())
}
