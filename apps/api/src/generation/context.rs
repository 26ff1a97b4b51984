//! Renders records as the text blocks the generation prompt embeds.
//!
//! Input order is preserved and nothing is deduplicated; callers decide which
//! records appear and in what order.

use crate::records::models::Record;

/// Separator placed between blocks when several are embedded in one prompt.
pub const BLOCK_SEPARATOR: &str = "\n---\n";

/// One record as seen by the prompt, with its retrieval relevance if it came
/// from similarity search.
#[derive(Debug, Clone, Copy)]
pub struct ContextSource<'a> {
    pub record: &'a Record,
    pub relevance: Option<f64>,
}

pub fn render_block(source: ContextSource<'_>) -> String {
    let record = source.record;
    let skills = if record.skills.is_empty() {
        "(none listed)".to_string()
    } else {
        record.skills.join(", ")
    };

    let mut block = format!("Title: {}\n", record.title);
    if let Some(dates) = &record.date_range {
        block.push_str(&format!("Dates: {dates}\n"));
    }
    block.push_str(&format!("Content: {}\n", record.content));
    block.push_str(&format!("Skills: {skills}"));
    if let Some(relevance) = source.relevance {
        block.push_str(&format!("\nRelevance: {}%", relevance_percent(relevance)));
    }
    block
}

pub fn assemble(sources: &[ContextSource<'_>]) -> Vec<String> {
    sources.iter().copied().map(render_block).collect()
}

fn relevance_percent(relevance: f64) -> u32 {
    (relevance.clamp(0.0, 1.0) * 100.0).round() as u32
}
