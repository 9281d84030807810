use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use ai_client::ExtractError;
use threadlens_common::config::matches_trigger;
use threadlens_common::{Report, TriggerEvent};
use threadlens_store::{AnalysisContext, AnalysisStore, CommentAnalysisRow};

use crate::aggregator::aggregate;
use crate::claims::ClaimExtractor;
use crate::error::{AnalyzerError, Result};
use crate::factcheck::FactChecker;
use crate::fallacy::FallacyAnalyzer;
use crate::linearizer::ThreadLinearizer;
use crate::traits::{EventSource, ReplySink, StructuredBackend, ThreadFetcher};

/// What happened to one trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The thread had nothing to analyze; the fixed report was posted and
    /// nothing was persisted.
    NothingToAnalyze { reply_id: String },
    /// Analysis could not be interpreted; the fixed apology was posted and
    /// persisted as an empty context.
    AnalysisFailed { reply_id: String },
    /// A full analysis was posted and persisted.
    Analyzed { reply_id: String, findings: usize },
}

/// The per-event analysis pipeline: linearize, extract claims, fact-check,
/// classify fallacies, aggregate, reply, persist.
pub struct Analyzer {
    fetcher: Arc<dyn ThreadFetcher>,
    sink: Arc<dyn ReplySink>,
    store: AnalysisStore,
    claims: ClaimExtractor,
    fact_checker: FactChecker,
    fallacy: FallacyAnalyzer,
    trigger_phrases: Vec<String>,
}

impl Analyzer {
    pub fn new(
        backend: Arc<dyn StructuredBackend>,
        fetcher: Arc<dyn ThreadFetcher>,
        sink: Arc<dyn ReplySink>,
        store: AnalysisStore,
    ) -> Self {
        Self {
            claims: ClaimExtractor::new(backend.clone()),
            fact_checker: FactChecker::new(backend.clone()),
            fallacy: FallacyAnalyzer::new(backend),
            fetcher,
            sink,
            store,
            trigger_phrases: Vec::new(),
        }
    }

    /// Only process events whose body contains one of these phrases.
    /// An empty list disables the filter.
    pub fn with_trigger_phrases(mut self, phrases: Vec<String>) -> Self {
        self.trigger_phrases = phrases;
        self
    }

    /// Cap concurrent fact-check requests. Unbounded when unset.
    pub fn with_fact_check_concurrency(mut self, n: usize) -> Self {
        self.fact_checker = self.fact_checker.with_max_concurrent(n);
        self
    }

    /// Deadline per individual fact-check call. None when unset.
    pub fn with_fact_check_timeout(mut self, timeout: Duration) -> Self {
        self.fact_checker = self.fact_checker.with_per_call_timeout(timeout);
        self
    }

    /// Run the full analysis for one trigger event. Every failure is
    /// contained to the event; callers log and move on.
    pub async fn process_event(&self, event: &TriggerEvent) -> Result<EventOutcome> {
        info!(
            event_id = event.event_id.as_str(),
            trigger = event.trigger_comment_id.as_str(),
            "Processing trigger event"
        );

        let document = ThreadLinearizer::new(self.fetcher.as_ref())
            .linearize(&event.trigger_comment_id)
            .await?;

        if document.is_empty_of_content() {
            info!(
                event_id = event.event_id.as_str(),
                "Nothing to analyze, posting fixed report"
            );
            let reply_id = self.post(event, &Report::nothing_to_analyze()).await?;
            return Ok(EventOutcome::NothingToAnalyze { reply_id });
        }

        // Claim extraction. Malformed output downgrades to "no claims";
        // an unavailable backend aborts the event with nothing persisted.
        let claims = match self.claims.extract(&document).await {
            Ok(claims) => claims,
            Err(ExtractError::MalformedOutput(reason)) => {
                warn!(
                    reason = reason.as_str(),
                    "Claim extraction output unusable, continuing without claims"
                );
                Vec::new()
            }
            Err(e @ ExtractError::BackendUnavailable(_)) => return Err(e.into()),
        };

        let verdicts = self.fact_checker.check(&claims).await;

        // Fallacy analysis. Malformed output substitutes the fixed apology
        // report; an unavailable backend aborts the event.
        let analysis = match self.fallacy.analyze(&document).await {
            Ok(analysis) => analysis,
            Err(ExtractError::MalformedOutput(reason)) => {
                warn!(
                    reason = reason.as_str(),
                    "Fallacy analysis output unusable, posting apology"
                );
                let report = Report::analysis_failed();
                let reply_id = self.post(event, &report).await?;
                self.persist(event, &reply_id, &report).await?;
                return Ok(EventOutcome::AnalysisFailed { reply_id });
            }
            Err(e @ ExtractError::BackendUnavailable(_)) => return Err(e.into()),
        };

        let report = aggregate(&document, analysis, &claims, verdicts);
        let reply_id = self.post(event, &report).await?;
        self.persist(event, &reply_id, &report).await?;

        info!(
            reply_id = reply_id.as_str(),
            findings = report.findings.len(),
            "Analysis posted and stored"
        );
        Ok(EventOutcome::Analyzed {
            reply_id,
            findings: report.findings.len(),
        })
    }

    /// Drain the event source: process batches until it reports empty.
    /// A single event's failure never terminates the loop.
    pub async fn run(&self, source: &dyn EventSource) -> anyhow::Result<()> {
        loop {
            let events = source.next_events().await?;
            if events.is_empty() {
                return Ok(());
            }

            for event in &events {
                if !self.trigger_phrases.is_empty()
                    && !matches_trigger(&self.trigger_phrases, &event.body)
                {
                    continue;
                }

                match self.process_event(event).await {
                    Ok(outcome) => info!(
                        event_id = event.event_id.as_str(),
                        ?outcome,
                        "Event processed"
                    ),
                    Err(e) => error!(
                        event_id = event.event_id.as_str(),
                        error = %e,
                        "Event failed, continuing"
                    ),
                }
            }
        }
    }

    async fn post(&self, event: &TriggerEvent, report: &Report) -> Result<String> {
        self.sink
            .post_reply(event, report)
            .await
            .map_err(|e| AnalyzerError::ReplyDelivery(e.to_string()))
    }

    /// Persist only after the reply succeeded: the reply's id is the
    /// analysis id, so there is nothing stable to key on before that.
    async fn persist(&self, event: &TriggerEvent, reply_id: &str, report: &Report) -> Result<()> {
        let context = AnalysisContext {
            analysis_id: reply_id.to_string(),
            trigger_comment_id: event.trigger_comment_id.clone(),
            thread_id: event.thread_id.clone(),
            community_id: event.community_id.clone(),
            overall_summary: report.overall_summary.clone(),
            overall_argument_type: report.overall_argument_type.as_str().to_string(),
        };

        let rows: Vec<CommentAnalysisRow> = report
            .findings
            .iter()
            .map(|finding| CommentAnalysisRow {
                comment_id: finding.comment_ref.clone(),
                analysis_id: context.analysis_id.clone(),
                author: if finding.author.trim().is_empty() {
                    "[deleted]".to_string()
                } else {
                    finding.author.clone()
                },
                comment_summary: finding.comment_summary.clone(),
                argument_type: finding.argument_type.as_str().to_string(),
                fallacy_type: finding.fallacy_type.clone(),
                flaw_description: finding.flaw_description.clone(),
            })
            .collect();

        self.store.put_analysis(&context, &rows).await?;
        Ok(())
    }
}
