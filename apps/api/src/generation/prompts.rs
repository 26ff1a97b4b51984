// The bullet-generation prompt template.
// Untrusted text (job description, record content) only ever enters the prompt
// through `llm_client::prompts::delimit`, behind DATA_ONLY_INSTRUCTION.

use crate::generation::bullets::PRIMARY_MARKER;
use crate::generation::context::BLOCK_SEPARATOR;
use crate::llm_client::prompts::{delimit, DATA_ONLY_INSTRUCTION};

pub const JOB_DESCRIPTION_TAG: &str = "job_description";
pub const EXPERIENCE_TAG: &str = "candidate_experience";

/// Builds the generation prompt for one or more context blocks.
///
/// Single-pass `format!`, so braces or placeholder-like text inside the job
/// description or record content are never re-expanded.
pub fn build_bullet_prompt(
    job_description: &str,
    context_blocks: &[String],
    num_bullets: usize,
) -> String {
    let job_description = delimit(JOB_DESCRIPTION_TAG, job_description);
    let experience = delimit(EXPERIENCE_TAG, &context_blocks.join(BLOCK_SEPARATOR));
    let marker = PRIMARY_MARKER;
    let data_only = DATA_ONLY_INSTRUCTION;

    format!(
        r#"You are a professional resume writer. Create {num_bullets} compelling resume bullet points based STRICTLY on the candidate's experience provided below.

{data_only}

{job_description}

{experience}

Generate exactly {num_bullets} bullet points that:
- Start with strong action verbs
- Use ONLY information from the candidate's experience above. DO NOT invent numbers, tools, employers, or outcomes that are not present in it
- Quantify achievements only where the experience already contains the figures; never add metrics that are not there
- Highlight skills that are relevant to the job description
- Are specific and results-oriented
- Are ATS-friendly: use standard job-related keywords from the job description, plain language, no graphics, symbols, tables, or columns

Return ONLY the {num_bullets} bullet points, one per line, each line starting with "{marker} " and nothing else before it."#
    )
}
