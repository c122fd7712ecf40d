//! Extraction run orchestration.
//!
//! Sequences one run over the provider: session → class listing →
//! assignment references → (cache | detail view → field extraction) →
//! correlation → cache update, then groups records by class and reads the
//! missing-assignments table. Runs strictly one provider call at a time and
//! never has more than one detail view open.

use std::collections::HashMap;

use chrono::Utc;
use tokio::time::timeout;
use uuid::Uuid;

use super::cache::{CacheUpdate, ExtractionCache};
use super::correlation::{correlate, ClassIndex, CorrelationInput, CorrelationSource};
use super::error::{PipelineError, ProviderError, RunPhase};
use super::fields::{extract_fields, normalize_date_label};
use super::metrics::normalize_class_name;
use super::missing::parse_missing_rows;
use super::traits::DocumentProvider;
use super::types::*;
use crate::config::RunConfig;

/// Generate a new run identifier.
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Run-scoped state threaded through the orchestrator.
pub struct RunContext<'a> {
    pub run_id: String,
    pub config: &'a RunConfig,
    pub index: ClassIndex,
    pub stats: RunStats,
}

impl<'a> RunContext<'a> {
    pub fn new(config: &'a RunConfig, index: ClassIndex) -> Self {
        Self {
            run_id: new_run_id(),
            config,
            index,
            stats: RunStats::default(),
        }
    }
}

/// Everything a completed run produced. Nothing is on disk until the
/// caller commits it.
#[derive(Debug)]
pub struct ExtractionRun {
    pub run_id: String,
    /// Classes of the active period, for the daily metrics merge.
    pub classes: Vec<ClassDescriptor>,
    pub grouped: Vec<ClassAssignments>,
    pub missing: Vec<MissingAssignment>,
    pub cache: ExtractionCache,
    pub stats: RunStats,
}

/// Execute one extraction run against `provider`.
///
/// The cache is taken by value and handed back inside the result, so an
/// aborted run leaves the caller's persisted state untouched.
pub async fn run_extraction<P: DocumentProvider>(
    provider: &mut P,
    mut cache: ExtractionCache,
    config: &RunConfig,
) -> Result<ExtractionRun, PipelineError> {
    provider
        .open_session(&config.credentials)
        .await
        .map_err(|e| PipelineError::provider(session_phase(&e), e))?;

    let listing = provider
        .class_listing()
        .await
        .map_err(|e| PipelineError::provider(RunPhase::ClassListing, e))?;
    let mut ctx = RunContext::new(config, ClassIndex::from_listing(&listing));

    let references = provider
        .assignment_refs()
        .await
        .map_err(|e| PipelineError::provider(RunPhase::Enumeration, e))?;

    let limit = config.max_assignments.unwrap_or(references.len());
    ctx.stats.skipped_by_cap = references.len().saturating_sub(limit) as u32;

    tracing::info!(
        run_id = %ctx.run_id,
        classes = ctx.index.len(),
        references = references.len(),
        limit,
        "Starting extraction run"
    );

    let mut resolved = Vec::with_capacity(limit.min(references.len()));
    for reference in references.iter().take(limit) {
        resolved.push(process_reference(provider, &mut ctx, &mut cache, reference).await?);
    }

    let grouped = group_by_class(&ctx.index, resolved);

    let missing = match provider.missing_assignment_rows().await {
        Ok(rows) => parse_missing_rows(&rows, config.marking_period.as_deref()),
        Err(e) if e.is_fatal() => {
            return Err(PipelineError::provider(RunPhase::MissingAssignments, e))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Missing assignments unavailable, continuing without them");
            Vec::new()
        }
    };

    let classes = ctx
        .index
        .current_classes(config.current_classes_only)
        .into_iter()
        .cloned()
        .collect();

    tracing::info!(
        run_id = %ctx.run_id,
        visited = ctx.stats.visited,
        cache_hits = ctx.stats.cache_hits,
        extracted = ctx.stats.extracted,
        graded = ctx.stats.graded,
        timeouts = ctx.stats.timeouts,
        missing = missing.len(),
        "Extraction run complete"
    );

    Ok(ExtractionRun {
        run_id: ctx.run_id,
        classes,
        grouped,
        missing,
        cache,
        stats: ctx.stats,
    })
}

fn session_phase(error: &ProviderError) -> RunPhase {
    match error {
        ProviderError::Navigation(_) => RunPhase::Navigation,
        _ => RunPhase::Login,
    }
}

/// Resolve one reference into its class and record.
async fn process_reference<P: DocumentProvider>(
    provider: &mut P,
    ctx: &mut RunContext<'_>,
    cache: &mut ExtractionCache,
    reference: &AssignmentRef,
) -> Result<(ClassDescriptor, AssignmentRecord), PipelineError> {
    ctx.stats.visited += 1;

    let key = reference.composite_key().cache_key();
    let cached = key.as_deref().and_then(|k| cache.lookup(k)).cloned();
    let cached_class = cached.as_ref().map(|entry| entry.descriptor());
    let hit = cached.filter(|_| !ctx.config.force_refresh);
    let preceding = provider.preceding_class_group(reference);

    let correlation = correlate(
        &ctx.index,
        &CorrelationInput {
            class_id: reference.class_id.as_deref(),
            group_hint: reference.group_hint.as_deref(),
            preceding_group: preceding.as_deref(),
            cached: cached_class.as_ref(),
        },
    );
    if correlation.source == CorrelationSource::RawIdentifier {
        ctx.stats.unresolved_classes += 1;
        tracing::debug!(
            assignment = %reference.name,
            class_id = ?reference.class_id,
            "Class not resolved, using raw identifier"
        );
    }

    if let (Some(key), Some(entry)) = (key.as_deref(), hit) {
        ctx.stats.cache_hits += 1;
        if correlation.source.is_fresh() {
            cache.refresh_class(key, &correlation.descriptor);
        }
        tracing::debug!(key, assignment = %reference.name, "Cache hit, skipping detail view");
        return Ok((correlation.descriptor, entry.record));
    }

    let fields = extract_detail(provider, ctx, reference).await?;
    let fallback_due = reference.due_label.as_deref().and_then(normalize_date_label);
    let record = AssignmentRecord::from_extraction(reference, &fields, fallback_due);

    ctx.stats.extracted += 1;
    if record.graded {
        ctx.stats.graded += 1;
    } else {
        ctx.stats.ungraded += 1;
    }

    if let Some(key) = key.as_deref() {
        let update = cache.reconcile(key, &record, &correlation.descriptor, Utc::now());
        if update == CacheUpdate::Evicted {
            ctx.stats.evicted += 1;
        }
    }

    Ok((correlation.descriptor, record))
}

/// Open the detail view, read it, and dismiss it before returning.
async fn extract_detail<P: DocumentProvider>(
    provider: &mut P,
    ctx: &mut RunContext<'_>,
    reference: &AssignmentRef,
) -> Result<FieldExtraction, PipelineError> {
    let opened = timeout(ctx.config.detail_timeout, provider.open_detail(reference)).await;
    let fields = match opened {
        Ok(Ok(fragment)) => extract_fields(&fragment),
        Ok(Err(e)) if e.is_fatal() => return Err(PipelineError::provider(RunPhase::Extraction, e)),
        Ok(Err(e)) => {
            ctx.stats.failures += 1;
            tracing::warn!(
                assignment = %reference.name,
                error = %e,
                "Detail view failed, recording as ungraded"
            );
            FieldExtraction::ungraded()
        }
        Err(_) => {
            ctx.stats.timeouts += 1;
            tracing::warn!(
                assignment = %reference.name,
                timeout_ms = ctx.config.detail_timeout.as_millis() as u64,
                "Detail view did not open in time, recording as ungraded"
            );
            FieldExtraction::ungraded()
        }
    };

    dismiss_detail(provider, ctx).await?;
    Ok(fields)
}

/// Try each dismissal action in order until one confirms. A timeout or an
/// exhausted list is treated as closed.
async fn dismiss_detail<P: DocumentProvider>(
    provider: &mut P,
    ctx: &mut RunContext<'_>,
) -> Result<(), PipelineError> {
    for action in DismissAction::sequence() {
        match timeout(ctx.config.close_timeout, provider.close_detail(*action)).await {
            Ok(Ok(true)) => return Ok(()),
            Ok(Ok(false)) => continue,
            Ok(Err(e)) if e.is_fatal() => {
                return Err(PipelineError::provider(RunPhase::Extraction, e))
            }
            Ok(Err(e)) => {
                tracing::debug!(action = ?action, error = %e, "Dismissal action failed");
            }
            Err(_) => {
                ctx.stats.timeouts += 1;
                tracing::warn!(
                    action = ?action,
                    "Dismissal timed out, assuming detail view closed"
                );
                return Ok(());
            }
        }
    }
    tracing::warn!("No dismissal action confirmed, assuming detail view closed");
    Ok(())
}

/// Group records by resolved class name. Listing classes come first in
/// listing order, then classes only seen through fallbacks. Empty groups
/// are dropped.
fn group_by_class(
    index: &ClassIndex,
    resolved: Vec<(ClassDescriptor, AssignmentRecord)>,
) -> Vec<ClassAssignments> {
    let mut groups: Vec<ClassAssignments> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    let mut slot_for = |class: &ClassDescriptor, groups: &mut Vec<ClassAssignments>| {
        let name = normalize_class_name(&class.class_name);
        *position.entry(name.clone()).or_insert_with(|| {
            groups.push(ClassAssignments {
                class_name: name,
                teacher: class.teacher.clone(),
                period: class.period.clone(),
                current_grade: class.current_grade,
                assignments: Vec::new(),
            });
            groups.len() - 1
        })
    };

    for class in index.classes() {
        slot_for(class, &mut groups);
    }
    for (class, record) in resolved {
        let slot = slot_for(&class, &mut groups);
        groups[slot].assignments.push(record);
    }

    groups.retain(|g| !g.assignments.is_empty());
    groups
}
