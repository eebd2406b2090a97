//! Submission pipeline.
//!
//! The pipeline owns everything around the validator: resolving the email
//! field through the [`FormConfigStore`], normalizing the submitted value,
//! timing the decision, bumping counters, logging and recording the
//! outcome.  The verdict itself stays a pure function in
//! [`crate::validator`].

use crate::audit::DecisionLog;
use crate::blocklist::BlocklistConfig;
use crate::config::FilterConfig;
use crate::store::{FormConfigStore, MemoryFormStore};
use crate::validator::{DomainBlocklistValidator, Verdict};
use crate::Submission;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Loose address shape, used only to flag odd-looking values in debug logs.
/// Validation itself never depends on it.
static EMAIL_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").unwrap()
});

/// Canonical form of a submitted email value: trimmed and lower-cased.
/// Returns `None` when nothing but whitespace was submitted.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

/// Verdict plus how long it took to reach.
#[derive(Clone, Debug)]
pub struct Decision {
    pub verdict: Verdict,
    pub latency_ms: u128,
}

#[derive(Debug, Default)]
struct PipelineStats {
    submissions_total: AtomicU64,
    accepted_total: AtomicU64,
    rejected_total: AtomicU64,
    config_errors_total: AtomicU64,
}

impl PipelineStats {
    fn record(&self, verdict: &Verdict) {
        self.submissions_total.fetch_add(1, Ordering::Relaxed);
        match verdict {
            Verdict::Accept => self.accepted_total.fetch_add(1, Ordering::Relaxed),
            Verdict::Reject { .. } => self.rejected_total.fetch_add(1, Ordering::Relaxed),
            Verdict::ConfigError { .. } => self.config_errors_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submissions_total: self.submissions_total.load(Ordering::Relaxed),
            accepted_total: self.accepted_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            config_errors_total: self.config_errors_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub submissions_total: u64,
    pub accepted_total: u64,
    pub rejected_total: u64,
    pub config_errors_total: u64,
}

/// Screens submissions for one deployment.  Cloning shares the store, the
/// counters and the decision log.
#[derive(Clone)]
pub struct SubmissionPipeline {
    store: Arc<dyn FormConfigStore>,
    validator: DomainBlocklistValidator,
    stats: Arc<PipelineStats>,
    decision_log: Option<DecisionLog>,
}

impl std::fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The store is a trait object without a `Debug` bound, so it stays
        // opaque here.
        f.debug_struct("SubmissionPipeline")
            .field("validator", &self.validator)
            .field("stats", &self.stats)
            .field("has_decision_log", &self.decision_log.is_some())
            .finish_non_exhaustive()
    }
}

impl SubmissionPipeline {
    pub fn new(store: Arc<dyn FormConfigStore>, validator: DomainBlocklistValidator) -> Self {
        Self {
            store,
            validator,
            stats: Arc::new(PipelineStats::default()),
            decision_log: None,
        }
    }

    pub fn with_decision_log(mut self, log: DecisionLog) -> Self {
        self.decision_log = Some(log);
        self
    }

    /// Build a pipeline from loaded configuration.  An unopenable decision
    /// log is reported and skipped; bad form seeds are an error.
    pub fn from_config(config: FilterConfig) -> anyhow::Result<Self> {
        let store = MemoryFormStore::from_definitions(config.forms)?;
        let validator = DomainBlocklistValidator::new(config.match_policy);
        let mut pipeline = Self::new(Arc::new(store), validator);
        if let Some(log_config) = &config.decision_log {
            match DecisionLog::open(log_config) {
                Ok(log) => pipeline = pipeline.with_decision_log(log),
                Err(e) => {
                    tracing::warn!(path=%log_config.path, error=%e, "failed to open decision log; continuing without it");
                }
            }
        }
        Ok(pipeline)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn decision_log(&self) -> Option<&DecisionLog> {
        self.decision_log.as_ref()
    }

    /// Screen one submission.
    pub async fn process(&self, submission: &Submission) -> Decision {
        let started = Instant::now();
        let verdict = self.evaluate(submission).await;
        let latency_ms = started.elapsed().as_millis();

        self.stats.record(&verdict);
        match &verdict {
            Verdict::Accept => tracing::debug!(
                form_id = submission.form_id,
                latency_ms = latency_ms as u64,
                "submission accepted"
            ),
            Verdict::Reject { domain, .. } => tracing::info!(
                form_id = submission.form_id,
                domain = %domain,
                latency_ms = latency_ms as u64,
                "submission rejected"
            ),
            Verdict::ConfigError { reason } => tracing::warn!(
                form_id = submission.form_id,
                reason = %reason,
                "submission could not be screened"
            ),
        }
        if let Some(log) = &self.decision_log {
            log.record(submission.form_id, &verdict, latency_ms);
        }

        Decision {
            verdict,
            latency_ms,
        }
    }

    async fn evaluate(&self, submission: &Submission) -> Verdict {
        let form = submission.form_id;
        // No resolvable email field is terminal; the blocklist is not even
        // fetched.
        let Some(field_name) = self.store.email_field_name(form).await else {
            return Verdict::field_not_found();
        };
        let email = normalize_email(submission.field(&field_name)).unwrap_or_default();
        if !email.is_empty() && !EMAIL_SHAPE_RE.is_match(&email) {
            tracing::debug!(form_id=form, "submitted value does not look like an email address");
        }
        let text = self.store.blocklist_text(form).await;
        let blocklist = BlocklistConfig::parse(&text);
        self.validator.validate(&email, &blocklist)
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, PipelineStats, EMAIL_SHAPE_RE};
    use crate::validator::Verdict;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  User@BadDomain.COM \n"),
            Some("user@baddomain.com".to_string())
        );
    }

    #[test]
    fn normalize_rejects_blank_values() {
        assert_eq!(normalize_email(""), None);
        assert_eq!(normalize_email("   \t  "), None);
    }

    #[test]
    fn shape_regex_is_advisory_only() {
        assert!(EMAIL_SHAPE_RE.is_match("user.name+tag@sub.example.com"));
        assert!(!EMAIL_SHAPE_RE.is_match("not an address"));
        assert!(!EMAIL_SHAPE_RE.is_match("user@nodot"));
    }

    #[test]
    fn stats_count_each_outcome() {
        let stats = PipelineStats::default();
        stats.record(&Verdict::Accept);
        stats.record(&Verdict::reject("spam.com"));
        stats.record(&Verdict::field_not_found());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.submissions_total, 3);
        assert_eq!(snapshot.accepted_total, 1);
        assert_eq!(snapshot.rejected_total, 1);
        assert_eq!(snapshot.config_errors_total, 1);
    }
}
