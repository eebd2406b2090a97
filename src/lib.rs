//! Core library for Formgate.  This crate screens form submissions against
//! per-form spam-domain blocklists: a pure decision function, the store
//! seam it reads form configuration through, and a submission pipeline that
//! ties the two together and records every decision.
//!
//! The host application owns form rendering, persistence and transport; it
//! hands this crate a [`Submission`] and a [`store::FormConfigStore`]
//! implementation, and gets back a [`validator::Verdict`].

mod config;
pub mod audit;
pub mod blocklist;
pub mod pipeline;
pub mod store;
pub mod validator;

pub use config::{FilterConfig, CONFIG_ENV_VAR};

pub use crate::audit::{DecisionLog, DecisionLogConfig, RotatingLog};
pub use crate::blocklist::{BlocklistConfig, MatchPolicy};
pub use crate::pipeline::{normalize_email, Decision, StatsSnapshot, SubmissionPipeline};
pub use crate::store::{
    FieldSpec, FormConfigStore, FormDefinition, MemoryFormStore, StoreInitError,
};
pub use crate::validator::{DomainBlocklistValidator, Verdict};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier the host application assigns to a form.
pub type FormId = u64;

/// One incoming submission as the host's request layer hands it over: the
/// target form plus the raw submitted values keyed by field name.  Which
/// field holds the email address is decided by the form's configuration,
/// not by the submission.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub form_id: FormId,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl Submission {
    /// Raw value of a field, empty when the field was not submitted.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}
