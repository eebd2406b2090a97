//! The blocklist validator and its verdicts.
//!
//! [`DomainBlocklistValidator::validate`] is a pure function of the
//! submitted email and the form's blocklist.  It never touches storage or
//! logging, which keeps the decision trivially testable; the pipeline owns
//! the surrounding plumbing.

use crate::blocklist::{BlocklistConfig, MatchPolicy};
use serde::Serialize;

/// Message surfaced when the email value cannot be resolved, either because
/// the form declares no required email field or the field arrived empty.
pub const FIELD_NOT_FOUND_MESSAGE: &str = "Email field name not found!";

/// Outcome of validating one submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Verdict {
    /// No blocklist entry matched; the submission proceeds.
    Accept,
    /// A blocklist entry occurred in the email.  `domain` is the first
    /// matching entry in list order and `reason` the user-facing message.
    #[serde(rename_all = "camelCase")]
    Reject { domain: String, reason: String },
    /// The email value could not be resolved.  Distinct from a spam
    /// rejection: nothing was actually screened.
    #[serde(rename_all = "camelCase")]
    ConfigError { reason: String },
}

impl Verdict {
    /// Rejection verdict for the given matched entry.
    pub fn reject(domain: &str) -> Self {
        Self::Reject {
            domain: domain.to_string(),
            reason: format!("Submission from {domain} is not allowed."),
        }
    }

    /// Configuration-error verdict for an unresolvable email value.
    pub fn field_not_found() -> Self {
        Self::ConfigError {
            reason: FIELD_NOT_FOUND_MESSAGE.to_string(),
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// User-facing message, if the verdict carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Accept => None,
            Self::Reject { reason, .. } | Self::ConfigError { reason } => Some(reason),
        }
    }
}

/// Screens a normalized email value against a form's blocklist.
#[derive(Clone, Copy, Debug, Default)]
pub struct DomainBlocklistValidator {
    policy: MatchPolicy,
}

impl DomainBlocklistValidator {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Validate one submission value.
    ///
    /// An empty `email` is terminal: the verdict is a configuration error
    /// and the blocklist is not consulted, so a list that would match the
    /// empty string cannot flip the outcome to a spam rejection.
    pub fn validate(&self, email: &str, blocklist: &BlocklistConfig) -> Verdict {
        if email.is_empty() {
            return Verdict::field_not_found();
        }
        match blocklist.first_match(email, self.policy) {
            Some(domain) => Verdict::reject(domain),
            None => Verdict::Accept,
        }
    }
}
