//! Form configuration storage.
//!
//! [`FormConfigStore`] is the seam between the pipeline and whatever holds
//! per-form settings.  [`MemoryFormStore`] is the in-process implementation,
//! seeded from code or from a JSON file.

use crate::FormId;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// One declared form field.  `kind` carries the raw declaration type, e.g.
/// `"email*"` for a required email field.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Per-form configuration: declared fields plus the raw blocklist blob.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub id: FormId,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default, alias = "spamDomains")]
    pub blocklist_text: String,
}

impl FormDefinition {
    /// Name of the first declared required email field, if any.  Optional
    /// email fields (`"email"`) do not qualify.
    pub fn email_field_name(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.kind == "email*")
            .map(|field| field.name.as_str())
    }
}

/// Read access to per-form configuration.
#[async_trait]
pub trait FormConfigStore: Send + Sync {
    /// Raw blocklist blob for `form`; empty when the form is unknown or has
    /// no blocklist configured.
    async fn blocklist_text(&self, form: FormId) -> String;

    /// Name of the field holding the submitter's email for `form`, or
    /// `None` when the form is unknown or declares no required email field.
    async fn email_field_name(&self, form: FormId) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum StoreInitError {
    #[error("failed to read forms file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid forms JSON in {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate form id {0} in seed data")]
    DuplicateForm(FormId),
}

/// Concurrent in-memory store.
#[derive(Debug, Default)]
pub struct MemoryFormStore {
    forms: DashMap<FormId, FormDefinition>,
}

impl MemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a form definition.
    pub fn upsert(&self, definition: FormDefinition) {
        self.forms.insert(definition.id, definition);
    }

    /// Replace the blocklist blob for `form`, creating a bare definition
    /// when the form is not yet known.
    pub fn set_blocklist_text(&self, form: FormId, text: impl Into<String>) {
        let text = text.into();
        match self.forms.get_mut(&form) {
            Some(mut definition) => definition.blocklist_text = text,
            None => {
                self.forms.insert(
                    form,
                    FormDefinition {
                        id: form,
                        blocklist_text: text,
                        ..FormDefinition::default()
                    },
                );
            }
        }
    }

    pub fn remove(&self, form: FormId) -> Option<FormDefinition> {
        self.forms.remove(&form).map(|(_, definition)| definition)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Build a store from seed definitions, rejecting duplicate form ids so
    /// a collision cannot silently drop configuration.
    pub fn from_definitions(definitions: Vec<FormDefinition>) -> Result<Self, StoreInitError> {
        let store = Self::new();
        for definition in definitions {
            if store.forms.contains_key(&definition.id) {
                return Err(StoreInitError::DuplicateForm(definition.id));
            }
            store.upsert(definition);
        }
        Ok(store)
    }

    /// Build a store from a JSON array of form definitions on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreInitError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| StoreInitError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let definitions: Vec<FormDefinition> =
            serde_json::from_str(&raw).map_err(|source| StoreInitError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_definitions(definitions)
    }
}

#[async_trait]
impl FormConfigStore for MemoryFormStore {
    async fn blocklist_text(&self, form: FormId) -> String {
        self.forms
            .get(&form)
            .map(|definition| definition.blocklist_text.clone())
            .unwrap_or_default()
    }

    async fn email_field_name(&self, form: FormId) -> Option<String> {
        self.forms
            .get(&form)
            .and_then(|definition| definition.email_field_name().map(str::to_string))
    }
}
