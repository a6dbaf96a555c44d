//! Form-backed create / update / delete over a persisted record array.
//!
//! Forms are plain serde structs. A [`Validator`] checks them field by
//! field against the JSON view of the struct; only a form with no failing
//! rule reaches a [`Collection`]. Every successful mutation rewrites the
//! whole array under the collection's storage key and raises a notice.

use std::fmt;

use regex::Regex;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{self, DatabaseError};
use crate::notify::{Confirm, NotificationCenter};

pub const INVALID_FORM_MESSAGE: &str = "Please fill all required fields";

// ═══════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Rule {
    Required,
    Min(f64),
    Max(f64),
    Pattern(Regex),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub rule: String,
    pub message: String,
}

/// Every failing field of one submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormErrors {
    pub errors: Vec<FieldError>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// A single failure, for checks that span more than one field.
    pub fn one(field: &str, rule: &str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.to_string(),
                rule: rule.to_string(),
                message: message.into(),
            }],
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: Vec<(String, Rule)>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, field: &str) -> Self {
        self.rules.push((field.to_string(), Rule::Required));
        self
    }

    pub fn min(mut self, field: &str, min: f64) -> Self {
        self.rules.push((field.to_string(), Rule::Min(min)));
        self
    }

    pub fn max(mut self, field: &str, max: f64) -> Self {
        self.rules.push((field.to_string(), Rule::Max(max)));
        self
    }

    pub fn pattern(mut self, field: &str, pattern: &Regex) -> Self {
        self.rules.push((field.to_string(), Rule::Pattern(pattern.clone())));
        self
    }

    /// Check every rule, collecting all failures.
    pub fn validate<F: Serialize>(&self, form: &F) -> Result<(), FormErrors> {
        let view = serde_json::to_value(form).unwrap_or(Value::Null);
        let mut errors = FormErrors::default();

        for (field, rule) in &self.rules {
            let value = view.get(field).unwrap_or(&Value::Null);
            if let Some(error) = check_rule(field, rule, value) {
                errors.errors.push(error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and raise the generic error notice on failure.
    pub fn check<F: Serialize>(
        &self,
        form: &F,
        notices: &NotificationCenter,
    ) -> Result<(), CrudError> {
        self.validate(form).map_err(|errors| {
            notices.error(INVALID_FORM_MESSAGE);
            CrudError::Invalid(errors)
        })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

// Min, max and pattern skip blank values; `required` covers those.
fn check_rule(field: &str, rule: &Rule, value: &Value) -> Option<FieldError> {
    let fail = |rule: &str, message: String| {
        Some(FieldError {
            field: field.to_string(),
            rule: rule.to_string(),
            message,
        })
    };

    match rule {
        Rule::Required if is_blank(value) => fail("required", format!("{field} is required")),
        Rule::Min(min) => match value.as_f64() {
            Some(v) if v < *min => fail("min", format!("{field} must be at least {min}")),
            _ => None,
        },
        Rule::Max(max) => match value.as_f64() {
            Some(v) if v > *max => fail("max", format!("{field} must be at most {max}")),
            _ => None,
        },
        Rule::Pattern(re) => match value.as_str() {
            Some(s) if !s.is_empty() && !re.is_match(s) => {
                fail("pattern", format!("{field} has an invalid format"))
            }
            _ => None,
        },
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════
// Collection
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error("Invalid form: {0}")]
    Invalid(FormErrors),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Action cancelled")]
    Cancelled,
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// A persisted record with a stable identifier.
pub trait Record: Clone + Serialize + DeserializeOwned {
    fn record_id(&self) -> String;
}

/// Where `create` places a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    Front,
    Back,
}

/// Persistence and notices for one mutation.
pub struct CrudContext<'a> {
    pub conn: &'a Connection,
    pub notices: &'a NotificationCenter,
}

/// A record array bound to its storage key.
pub struct Collection<T: Record> {
    key: &'static str,
    version: u32,
    /// Noun used in notices, e.g. "Adverse event".
    label: &'static str,
    records: Vec<T>,
}

impl<T: Record> Collection<T> {
    pub fn new(key: &'static str, version: u32, label: &'static str, records: Vec<T>) -> Self {
        Self {
            key,
            version,
            label,
            records,
        }
    }

    /// Load the stored array, or build and persist it when absent.
    pub fn load_or_init(
        conn: &Connection,
        key: &'static str,
        version: u32,
        label: &'static str,
        init: impl FnOnce() -> Vec<T>,
    ) -> Result<Self, DatabaseError> {
        let records = db::load_or_init(conn, key, version, init)?;
        Ok(Self::new(key, version, label, records))
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.record_id() == id)
    }

    fn position(&self, id: &str) -> Result<usize, CrudError> {
        self.records
            .iter()
            .position(|r| r.record_id() == id)
            .ok_or_else(|| CrudError::NotFound(id.to_string()))
    }

    fn persist(&self, conn: &Connection) -> Result<(), CrudError> {
        db::save_records(conn, self.key, self.version, &self.records)?;
        Ok(())
    }

    pub fn create(&mut self, ctx: &CrudContext<'_>, record: T, at: InsertAt) -> Result<(), CrudError> {
        let id = record.record_id();
        match at {
            InsertAt::Front => self.records.insert(0, record),
            InsertAt::Back => self.records.push(record),
        }
        self.persist(ctx.conn)?;
        tracing::info!(key = self.key, id = %id, "Record created");
        ctx.notices.success(format!("{} created successfully", self.label));
        Ok(())
    }

    /// Apply `patch` to the record with `id` in place.
    pub fn update(
        &mut self,
        ctx: &CrudContext<'_>,
        id: &str,
        patch: impl FnOnce(&mut T),
    ) -> Result<&T, CrudError> {
        let message = format!("{} updated successfully", self.label);
        self.update_with(ctx, id, &message, patch)
    }

    /// Like [`Collection::update`] with a caller-chosen success notice.
    pub fn update_with(
        &mut self,
        ctx: &CrudContext<'_>,
        id: &str,
        message: &str,
        patch: impl FnOnce(&mut T),
    ) -> Result<&T, CrudError> {
        let index = self.position(id)?;
        patch(&mut self.records[index]);
        self.persist(ctx.conn)?;
        tracing::info!(key = self.key, id, "Record updated");
        ctx.notices.success(message);
        Ok(&self.records[index])
    }

    /// Remove after confirmation. A refused prompt changes nothing.
    pub fn delete(
        &mut self,
        ctx: &CrudContext<'_>,
        id: &str,
        confirm: &dyn Confirm,
    ) -> Result<T, CrudError> {
        let index = self.position(id)?;
        let prompt = format!("Are you sure you want to delete this {}?", self.label.to_lowercase());
        if !confirm.confirm(&prompt) {
            return Err(CrudError::Cancelled);
        }
        let removed = self.records.remove(index);
        self.persist(ctx.conn)?;
        tracing::info!(key = self.key, id, "Record deleted");
        ctx.notices.success(format!("{} deleted successfully", self.label));
        Ok(removed)
    }

    /// Flip a boolean field. Not validated.
    pub fn toggle(
        &mut self,
        ctx: &CrudContext<'_>,
        id: &str,
        field: impl FnOnce(&mut T) -> &mut bool,
    ) -> Result<bool, CrudError> {
        let index = self.position(id)?;
        let flag = field(&mut self.records[index]);
        *flag = !*flag;
        let now = *flag;
        self.persist(ctx.conn)?;
        ctx.notices.success(format!("{} updated successfully", self.label));
        Ok(now)
    }

    /// Replace the whole array (regenerate) and persist it.
    pub fn replace_all(&mut self, conn: &Connection, records: Vec<T>) -> Result<(), CrudError> {
        self.records = records;
        self.persist(conn)
    }
}
