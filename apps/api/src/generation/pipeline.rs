//! Bullet generation pipeline.
//!
//! Flow: validate → (explicit selection | similarity retrieval) → per record:
//!       assemble context → build prompt → generate → parse → aggregate.
//!
//! Each in-scope record gets its own prompt, generation call and parse. Records
//! are processed concurrently, results are reported in input order, and a
//! failure for one record does not abort the others. Nothing here writes to
//! the datastore.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::errors::AppError;
use crate::generation::bullets::parse_bullets;
use crate::generation::context::{assemble, ContextSource};
use crate::generation::prompts::build_bullet_prompt;
use crate::llm_client::TextGenerator;
use crate::records::models::{Category, Record};
use crate::records::store::RecordStore;
use crate::records::validation::{check_text, validate_record_id};
use crate::search::{search_text, SearchLimits};

pub const MIN_JOB_DESCRIPTION_CHARS: usize = 10;
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_BULLETS: usize = 10;
pub const DEFAULT_BULLETS: usize = 3;
pub const MAX_SELECTED_RECORDS: usize = 20;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Request body for bullet generation.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub job_description: String,
    #[serde(default = "default_bullets")]
    pub num_bullets: usize,
    /// Explicit selection, in the order results should be returned. Empty means
    /// "retrieve the most relevant records for the job description".
    #[serde(default, alias = "experience_ids")]
    pub record_ids: Vec<String>,
}

fn default_bullets() -> usize {
    DEFAULT_BULLETS
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        check_text(
            "job_description",
            &self.job_description,
            MIN_JOB_DESCRIPTION_CHARS,
            MAX_JOB_DESCRIPTION_CHARS,
        )
        .map_err(|_| {
            AppError::Validation(format!(
                "job_description must be between {MIN_JOB_DESCRIPTION_CHARS} and \
                 {MAX_JOB_DESCRIPTION_CHARS} characters"
            ))
        })?;

        if !(1..=MAX_BULLETS).contains(&self.num_bullets) {
            return Err(AppError::Validation(format!(
                "num_bullets must be between 1 and {MAX_BULLETS}"
            )));
        }

        if self.record_ids.len() > MAX_SELECTED_RECORDS {
            return Err(AppError::Validation(format!(
                "At most {MAX_SELECTED_RECORDS} records may be selected"
            )));
        }
        let mut seen = HashSet::new();
        for id in &self.record_ids {
            validate_record_id(id)?;
            if !seen.insert(id.trim()) {
                return Err(AppError::Validation(format!(
                    "Record '{}' was selected more than once",
                    id.trim()
                )));
            }
        }
        Ok(())
    }
}

/// Pipeline states, logged as the request moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Retrieving,
    UsingSelection,
    BuildingPrompt,
    Generating,
    Parsing,
    Done,
}

/// Which record a set of bullets came from.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceRef {
    pub id: String,
    pub title: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceBullets {
    pub source: SourceRef,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: SourceRef,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub results: Vec<SourceBullets>,
    pub failures: Vec<SourceFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Tunables taken from `Config` at startup.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// How many records the retrieval branch uses.
    pub retrieval_k: usize,
    pub search_limits: SearchLimits,
    pub temperature: f32,
    pub generation_timeout: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// The orchestrator, holding explicit handles to every service it uses.
#[derive(Clone)]
pub struct BulletPipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn RecordStore>,
    settings: PipelineSettings,
}

impl BulletPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn RecordStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            settings,
        }
    }

    pub async fn run(
        &self,
        owner_id: &str,
        request: &GenerateRequest,
    ) -> Result<GenerationOutcome, AppError> {
        let mut stage = Stage::Validating;
        let result = self.run_stages(owner_id, request, &mut stage).await;
        match &result {
            Ok(outcome) => info!(
                "Generated bullets for {} record(s), {} failure(s), owner {owner_id}",
                outcome.results.len(),
                outcome.failures.len()
            ),
            Err(e) => warn!("Generation failed at {stage:?} for owner {owner_id}: {e}"),
        }
        result
    }

    async fn run_stages(
        &self,
        owner_id: &str,
        request: &GenerateRequest,
        stage: &mut Stage,
    ) -> Result<GenerationOutcome, AppError> {
        request.validate()?;
        let job_description = request.job_description.trim();
        let num_bullets = request.num_bullets.clamp(1, MAX_BULLETS);

        let scoped: Vec<(Record, Option<f64>)> = if request.record_ids.is_empty() {
            advance(stage, Stage::Retrieving);
            let hits = search_text(
                self.embedder.as_ref(),
                self.store.as_ref(),
                owner_id,
                job_description,
                self.settings.retrieval_k,
                self.settings.search_limits,
            )
            .await?;
            if hits.is_empty() {
                advance(stage, Stage::Done);
                return Ok(GenerationOutcome {
                    results: Vec::new(),
                    failures: Vec::new(),
                    message: Some(
                        "No records found to generate from. Add some work history first."
                            .to_string(),
                    ),
                });
            }
            hits.into_iter()
                .map(|hit| (hit.record, Some(hit.relevance)))
                .collect()
        } else {
            advance(stage, Stage::UsingSelection);
            let selected = self.load_selection(owner_id, &request.record_ids).await?;
            if selected.is_empty() {
                return Err(AppError::NotFound(
                    "None of the selected records were found".to_string(),
                ));
            }
            selected.into_iter().map(|record| (record, None)).collect()
        };

        advance(stage, Stage::Generating);
        let outcomes = join_all(
            scoped
                .iter()
                .map(|(record, relevance)| {
                    self.generate_for(job_description, record, *relevance, num_bullets)
                }),
        )
        .await;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(bullets) => results.push(bullets),
                Err((source, error)) => {
                    failures.push(SourceFailure {
                        source,
                        code: error.code(),
                        message: error.public_message(),
                    });
                    first_error.get_or_insert(error);
                }
            }
        }

        if results.is_empty() {
            if let Some(error) = first_error {
                return Err(error);
            }
        }

        advance(stage, Stage::Done);
        Ok(GenerationOutcome {
            results,
            failures,
            message: None,
        })
    }

    /// Looks up the selection within the owner's scope, preserving the caller's order.
    async fn load_selection(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> Result<Vec<Record>, AppError> {
        let ids: Vec<String> = ids.iter().map(|id| id.trim().to_string()).collect();
        let found = self.store.get_many(owner_id, &ids).await?;
        let mut by_id: HashMap<String, Record> = found
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| (r.id.clone(), r))
            .collect();

        let selected: Vec<Record> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        if selected.len() < ids.len() {
            debug!(
                "{} of {} selected record(s) not found for owner {owner_id}",
                ids.len() - selected.len(),
                ids.len()
            );
        }
        Ok(selected)
    }

    /// One prompt, one generation call, one parse.
    async fn generate_for(
        &self,
        job_description: &str,
        record: &Record,
        relevance: Option<f64>,
        num_bullets: usize,
    ) -> Result<SourceBullets, (SourceRef, AppError)> {
        let source = SourceRef {
            id: record.id.clone(),
            title: record.title.clone(),
            category: record.category,
            relevance,
        };

        debug!("Record {}: {:?}", record.id, Stage::BuildingPrompt);
        let blocks = assemble(&[ContextSource { record, relevance }]);
        let prompt = build_bullet_prompt(job_description, &blocks, num_bullets);

        debug!("Record {}: {:?}", record.id, Stage::Generating);
        let raw = match self
            .generator
            .generate(
                &prompt,
                self.settings.temperature,
                self.settings.generation_timeout,
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Generation failed for record {}: {e}", record.id);
                return Err((source, AppError::from(e)));
            }
        };

        debug!("Record {}: {:?}", record.id, Stage::Parsing);
        let bullets = parse_bullets(&raw, num_bullets);
        if bullets.is_empty() {
            warn!("Generation returned an empty response for record {}", record.id);
            return Err((
                source,
                AppError::Upstream("The AI service returned an empty response".to_string()),
            ));
        }
        Ok(SourceBullets { source, bullets })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("Pipeline {stage:?} -> {next:?}");
    *stage = next;
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
