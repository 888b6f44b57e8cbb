//! Aggregation pipeline: resolve -> enumerate -> detail -> merge.
//!
//! Region resolution is the only hard failure. Every later problem is scoped
//! to one sub-district or one complex, recorded in the [`RunReport`], and the
//! run continues with the next unit.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::detail::{DetailFetcher, DetailOutcome};
use crate::enumerator::ComplexEnumerator;
use crate::error::{Result, SourceError};
use crate::extractors::CompiledProfile;
use crate::model::{AggregatedRecord, ComplexDetail, ComplexSummary, Provenance, RegionNode};
use crate::region::{is_all, RegionIndex};
use crate::source::{HttpSource, RemoteSource};

/// What to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectQuery {
    pub city: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub sub_district: Option<String>,
}

impl CollectQuery {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            district: None,
            sub_district: None,
        }
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn with_sub_district(mut self, sub_district: impl Into<String>) -> Self {
        self.sub_district = Some(sub_district.into());
        self
    }
}

/// Pipeline state. `Failed` is only reachable from `Resolving`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "reason", rename_all = "camelCase")]
pub enum RunStage {
    Resolving,
    Enumerating,
    Detailing,
    Merging,
    Done,
    Failed(String),
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolving => f.write_str("resolving"),
            Self::Enumerating => f.write_str("enumerating"),
            Self::Detailing => f.write_str("detailing"),
            Self::Merging => f.write_str("merging"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Progress notification for the presentation layer. Carries no data the
/// result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    ComplexProcessed {
        sub_district_code: String,
        complex_id: Option<String>,
        complex_name: Option<String>,
        records: usize,
    },
    #[serde(rename_all = "camelCase")]
    SubDistrictProcessed {
        code: String,
        name: String,
        position: usize,
        total: usize,
        records: usize,
    },
}

impl ProgressEvent {
    /// Human-readable line for display
    pub fn label(&self) -> String {
        match self {
            Self::ComplexProcessed {
                complex_id,
                complex_name,
                records,
                ..
            } => format!(
                "{} ({}) - {}건 수집",
                complex_name.as_deref().unwrap_or("?"),
                complex_id.as_deref().unwrap_or("?"),
                records
            ),
            Self::SubDistrictProcessed {
                code,
                name,
                position,
                total,
                ..
            } => format!("{name} ({code}) - 수집완료 [{position}/{total}]"),
        }
    }
}

/// A unit that contributed nothing, or only part of its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "unit", rename_all = "camelCase")]
pub enum UnitRef {
    #[serde(rename_all = "camelCase")]
    SubDistrict { code: String, name: String },
    #[serde(rename_all = "camelCase")]
    Complex {
        sub_district_code: String,
        complex_id: Option<String>,
    },
}

/// One unit and every problem met on it. A unit appears at most once per list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitIssue {
    #[serde(flatten)]
    pub unit: UnitRef,
    pub reasons: Vec<SourceError>,
}

impl UnitIssue {
    pub fn new(unit: UnitRef, reason: SourceError) -> Self {
        Self {
            unit,
            reasons: vec![reason],
        }
    }

    /// Kind of the first recorded problem
    pub fn kind(&self) -> Option<&'static str> {
        self.reasons.first().map(SourceError::kind)
    }
}

/// Result of a run that got past region resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// In (sub-district, complex, listing) order
    pub records: Vec<AggregatedRecord>,
    /// Units skipped entirely
    pub skipped: Vec<UnitIssue>,
    /// Document-level problems on complexes that still contributed
    pub partial: Vec<UnitIssue>,
    pub cancelled: bool,
    pub stage: RunStage,
    pub sub_districts_processed: usize,
    pub complexes_processed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub records: usize,
    pub skipped: Vec<UnitIssue>,
    pub partial: Vec<UnitIssue>,
    pub cancelled: bool,
    pub stage: RunStage,
    pub sub_districts_processed: usize,
    pub complexes_processed: usize,
}

impl RunReport {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
            partial: Vec::new(),
            cancelled: false,
            stage: RunStage::Resolving,
            sub_districts_processed: 0,
            complexes_processed: 0,
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Everything but the records
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            records: self.records.len(),
            skipped: self.skipped.clone(),
            partial: self.partial.clone(),
            cancelled: self.cancelled,
            stage: self.stage.clone(),
            sub_districts_processed: self.sub_districts_processed,
            complexes_processed: self.complexes_processed,
        }
    }

    fn enter(&mut self, stage: RunStage) {
        if self.stage != stage {
            debug!(from = %self.stage, to = %stage, "Pipeline stage");
            self.stage = stage;
        }
    }
}

/// Resolves a region and correlates complex metadata with live listings.
pub struct Collector<S: RemoteSource> {
    regions: Arc<RegionIndex>,
    source: S,
    config: CollectorConfig,
    profile: CompiledProfile,
}

impl Collector<HttpSource> {
    /// Collector over the configured HTTP endpoints.
    pub fn http(regions: Arc<RegionIndex>, config: CollectorConfig) -> Result<Self> {
        let source = HttpSource::new(config.clone())?;
        Ok(Self::new(regions, source, config))
    }
}

impl<S: RemoteSource> Collector<S> {
    pub fn new(regions: Arc<RegionIndex>, source: S, config: CollectorConfig) -> Self {
        let profile = config.profile.compile();
        Self {
            regions,
            source,
            config,
            profile,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run without progress reporting or cancellation.
    pub async fn run(
        &self,
        city: &str,
        district: Option<&str>,
        sub_district: Option<&str>,
    ) -> Result<RunReport> {
        let query = CollectQuery {
            city: city.to_string(),
            district: district.map(String::from),
            sub_district: sub_district.map(String::from),
        };
        self.run_with(&query, None, &CancellationToken::new()).await
    }

    /// Run with an optional progress channel and a cancellation token.
    ///
    /// Cancellation is honoured between sub-districts and between complexes;
    /// records gathered so far are returned with `cancelled` set.
    pub async fn run_with(
        &self,
        query: &CollectQuery,
        progress: Option<&UnboundedSender<ProgressEvent>>,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let mut report = RunReport::new();

        let mut resolution = self
            .regions
            .resolve(&query.city, query.district.as_deref())
            .map_err(|e| {
                warn!(stage = %RunStage::Failed(e.to_string()), "Region resolution failed");
                e
            })?;
        if !is_all(query.sub_district.as_deref()) {
            if let Some(name) = query.sub_district.as_deref() {
                resolution.retain_named(name);
            }
        }
        info!(
            city = %query.city,
            district = ?query.district,
            sub_districts = resolution.nodes.len(),
            "Region resolved"
        );

        let total = resolution.nodes.len();
        for (position, node) in resolution.nodes.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            report.enter(RunStage::Enumerating);
            let before = report.records.len();
            self.collect_sub_district(query, node, progress, cancel, &mut report)
                .await;
            if report.cancelled {
                // interrupted partway: not counted, not reported as finished
                break;
            }
            report.sub_districts_processed += 1;

            notify(
                progress,
                ProgressEvent::SubDistrictProcessed {
                    code: node.code.clone(),
                    name: node.name.clone(),
                    position: position + 1,
                    total,
                    records: report.records.len() - before,
                },
            );
        }

        report.enter(RunStage::Done);
        info!(
            records = report.records.len(),
            skipped = report.skipped_count(),
            cancelled = report.cancelled,
            "Collection finished"
        );
        Ok(report)
    }

    async fn collect_sub_district(
        &self,
        query: &CollectQuery,
        node: &RegionNode,
        progress: Option<&UnboundedSender<ProgressEvent>>,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) {
        let summaries = match ComplexEnumerator::new(&self.source)
            .list_complexes(&node.code)
            .await
        {
            Ok(s) => s,
            Err(reason) => {
                report.skipped.push(UnitIssue::new(
                    UnitRef::SubDistrict {
                        code: node.code.clone(),
                        name: node.name.clone(),
                    },
                    reason,
                ));
                return;
            }
        };

        // Stamped now, from this iteration's node
        let provenance = Provenance {
            sub_district_code: node.code.clone(),
            sub_district_name: node.name.clone(),
            city_name: query.city.clone(),
            district_name: query.district.clone(),
        };

        report.enter(RunStage::Detailing);
        let fetcher = DetailFetcher::new(&self.source, &self.profile);
        let fetcher = &fetcher;

        // buffered() keeps input order, so output order is independent of concurrency
        let mut outcomes = stream::iter(summaries.iter())
            .map(|summary| async move {
                let outcome = match summary.complex_id.as_deref() {
                    Some(id) => Some(fetcher.fetch_detail(id).await),
                    None => None,
                };
                (summary, outcome)
            })
            .buffered(self.config.concurrency());

        let mut remaining = summaries.len();
        while let Some((summary, outcome)) = outcomes.next().await {
            remaining -= 1;
            report.enter(RunStage::Merging);
            let records = merge_complex(&provenance, summary, outcome, report);
            report.complexes_processed += 1;

            notify(
                progress,
                ProgressEvent::ComplexProcessed {
                    sub_district_code: node.code.clone(),
                    complex_id: summary.complex_id.clone(),
                    complex_name: summary.name.clone(),
                    records,
                },
            );

            // after the last complex the sub-district is complete either way
            if remaining > 0 && cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
        }
    }
}

/// Append one record per listing of a complex. Returns how many were added.
fn merge_complex(
    provenance: &Provenance,
    summary: &ComplexSummary,
    outcome: Option<DetailOutcome>,
    report: &mut RunReport,
) -> usize {
    let unit = || UnitRef::Complex {
        sub_district_code: provenance.sub_district_code.clone(),
        complex_id: summary.complex_id.clone(),
    };

    let (Some(complex_id), Some(outcome)) = (summary.complex_id.as_deref(), outcome) else {
        warn!(code = %provenance.sub_district_code, name = ?summary.name, "Complex without id skipped");
        report.skipped.push(UnitIssue::new(
            unit(),
            SourceError::incomplete("complex summary", "no complex id"),
        ));
        return 0;
    };

    if outcome.is_failed() {
        report.skipped.push(UnitIssue {
            unit: unit(),
            reasons: outcome.issues,
        });
        return 0;
    }
    if !outcome.issues.is_empty() {
        report.partial.push(UnitIssue {
            unit: unit(),
            reasons: outcome.issues,
        });
    }

    let detail = outcome
        .detail
        .unwrap_or_else(|| ComplexDetail::placeholder(complex_id, summary.name.as_deref()));

    let added = outcome.listings.len();
    report.records.extend(
        outcome
            .listings
            .into_iter()
            .map(|listing| AggregatedRecord::new(provenance.clone(), &detail, listing)),
    );
    added
}

fn notify(progress: Option<&UnboundedSender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        debug!(label = %event.label(), "Progress");
        // A closed receiver only means nobody is watching
        let _ = tx.send(event);
    }
}
