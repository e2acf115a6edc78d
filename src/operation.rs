//! Operation domain record, boundary input, draft, and filter types.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OperationId;

/// Calendar format used for the `date` column and date filter parameters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Rejected boundary input. Nothing is archived or inserted after one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `missionDuration` is not a finite floating-point number.
    #[error("invalid mission duration: {raw:?}")]
    MissionDuration {
        /// Value as received.
        raw: String,
    },
    /// A filter date is not `YYYY-MM-DD`.
    #[error("invalid {field} date: {raw:?}")]
    Date {
        /// Parameter name (`older` or `newer`).
        field: &'static str,
        /// Value as received.
        raw: String,
    },
}

/// Raw string fields of an add request, keyed by their wire names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationFields {
    /// `worldName`.
    pub world_name: String,
    /// `missionName`.
    pub mission_name: String,
    /// `missionDuration`, still unparsed.
    pub mission_duration: String,
    /// `filename`; replaced by the archiver.
    pub filename: String,
    /// `type`.
    pub class: String,
}

impl OperationFields {
    /// Collects fields from string pairs. Unknown keys are ignored and
    /// missing keys stay empty.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut fields = Self::default();
        for (key, value) in pairs {
            fields.set(key.as_ref(), value.into());
        }
        fields
    }

    /// Sets one field by wire name. Returns `false` if the name is unknown.
    pub fn set(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "worldName" => &mut self.world_name,
            "missionName" => &mut self.mission_name,
            "missionDuration" => &mut self.mission_duration,
            "filename" => &mut self.filename,
            "type" => &mut self.class,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// Validated operation that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDraft {
    /// Map / world name.
    pub world_name: String,
    /// Mission name.
    pub mission_name: String,
    /// Duration in seconds.
    pub mission_duration: f64,
    /// Archived report name (without `.gz`).
    pub filename: String,
    /// Creation date.
    pub date: NaiveDate,
    /// Category tag.
    pub class: String,
}

impl OperationDraft {
    /// Builds a draft stamped with today's local date.
    pub fn from_fields(fields: OperationFields) -> Result<Self, ValidationError> {
        Self::from_fields_on(fields, Local::now().date_naive())
    }

    /// Builds a draft stamped with `date`.
    ///
    /// Only `missionDuration` is validated. Empty names, unknown class tags
    /// and empty filenames pass through untouched.
    pub fn from_fields_on(fields: OperationFields, date: NaiveDate) -> Result<Self, ValidationError> {
        let mission_duration = parse_duration(&fields.mission_duration)?;
        Ok(Self {
            world_name: fields.world_name,
            mission_name: fields.mission_name,
            mission_duration,
            filename: fields.filename,
            date,
            class: fields.class,
        })
    }

    /// Materializes the stored record once the store assigned `id`.
    pub fn into_record(self, id: OperationId) -> Operation {
        Operation {
            id,
            world_name: self.world_name,
            mission_name: self.mission_name,
            mission_duration: self.mission_duration,
            filename: self.filename,
            date: self.date,
            class: self.class,
        }
    }
}

/// One persisted mission report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Store-assigned id.
    pub id: OperationId,
    /// Map / world name.
    pub world_name: String,
    /// Mission name.
    pub mission_name: String,
    /// Duration in seconds.
    pub mission_duration: f64,
    /// Archived report name (without `.gz`).
    pub filename: String,
    /// Creation date, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Category tag.
    #[serde(rename = "type")]
    pub class: String,
}

/// Read-side query shape. Empty substrings and missing bounds do not constrain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationFilter {
    /// Substring of `mission_name`.
    pub mission_name: String,
    /// Substring of `type`.
    pub class: String,
    /// Inclusive lower date bound.
    pub newer: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub older: Option<NaiveDate>,
}

impl OperationFilter {
    /// Parses the raw `type`, `name`, `older` and `newer` read parameters.
    pub fn from_params(class: &str, name: &str, older: &str, newer: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            mission_name: name.to_string(),
            class: class.to_string(),
            newer: parse_date("newer", newer)?,
            older: parse_date("older", older)?,
        })
    }

    /// True when both bounds are set and `older` precedes `newer`.
    pub fn is_inverted(&self) -> bool {
        matches!((self.newer, self.older), (Some(newer), Some(older)) if older < newer)
    }

    /// Evaluates the filter against one record with SQL `LIKE` semantics
    /// (ASCII case-insensitive substring).
    pub fn matches(&self, op: &Operation) -> bool {
        contains_ascii_ci(&op.mission_name, &self.mission_name)
            && contains_ascii_ci(&op.class, &self.class)
            && self.newer.is_none_or(|newer| op.date >= newer)
            && self.older.is_none_or(|older| op.date <= older)
    }
}

fn parse_duration(raw: &str) -> Result<f64, ValidationError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationError::MissionDuration {
            raw: raw.to_string(),
        }),
    }
}

fn parse_date(field: &'static str, raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(Some)
        .map_err(|_| ValidationError::Date {
            field,
            raw: raw.to_string(),
        })
}

fn contains_ascii_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
