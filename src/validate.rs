//! Form validation for the processing request.

use std::num::NonZeroU64;
use std::path::Path;

use crate::config::RowLimitPolicy;
use crate::error::UploadError;
use crate::protocol::{AdditionalColumn, ProcessingRequest};

/// Named form field a validation message attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ApiKey,
    Instructions,
    FilePath,
    Model,
    RowLimit,
    /// 1-based index into the additional columns.
    AdditionalColumn(usize),
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::ApiKey => write!(f, "api_key"),
            Field::Instructions => write!(f, "instructions"),
            Field::FilePath => write!(f, "file_path"),
            Field::Model => write!(f, "model"),
            Field::RowLimit => write!(f, "row_limit"),
            Field::AdditionalColumn(i) => write!(f, "additional_column_{i}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// Raw, unvalidated snapshot of the processing form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub api_key: String,
    pub instructions: String,
    /// Set once an upload has completed.
    pub file_path: Option<String>,
    pub model: Option<String>,
    /// Exactly as typed; parsed during validation.
    pub row_limit: Option<String>,
    pub additional_columns: Vec<AdditionalColumn>,
}

/// Rules that vary per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationRules {
    pub row_limit: RowLimitPolicy,
}

const ROW_LIMIT_MESSAGE: &str = "Please enter a valid number of rows";

/// Check `fields` and return one error per failing field; empty means valid.
pub fn validate(fields: &FormFields, rules: &ValidationRules) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if fields.api_key.trim().is_empty() {
        errors.push(FieldError::new(Field::ApiKey, "API key is required"));
    }
    if fields.instructions.trim().is_empty() {
        errors.push(FieldError::new(Field::Instructions, "Instructions are required"));
    }
    if fields.file_path.as_deref().map_or(true, |p| p.trim().is_empty()) {
        errors.push(FieldError::new(Field::FilePath, "Please upload a file first"));
    }
    if fields.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
        errors.push(FieldError::new(Field::Model, "Please select a model"));
    }

    match non_blank(fields.row_limit.as_deref()) {
        Some(raw) => {
            if parse_row_limit(raw).is_none() {
                errors.push(FieldError::new(Field::RowLimit, ROW_LIMIT_MESSAGE));
            }
        }
        None if rules.row_limit == RowLimitPolicy::Required => {
            errors.push(FieldError::new(Field::RowLimit, ROW_LIMIT_MESSAGE));
        }
        None => {}
    }

    for (i, column) in fields.additional_columns.iter().enumerate() {
        if column.name.trim().is_empty() || column.instructions.trim().is_empty() {
            let index = i + 1;
            errors.push(FieldError::new(
                Field::AdditionalColumn(index),
                format!("Please fill in all fields for Additional Column {index}"),
            ));
        }
    }

    errors
}

/// Validate and, on success, freeze the form into a request.
pub fn build_request(
    fields: &FormFields,
    rules: &ValidationRules,
) -> Result<ProcessingRequest, Vec<FieldError>> {
    let errors = validate(fields, rules);
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ProcessingRequest {
        api_key: fields.api_key.trim().to_string(),
        model: fields.model.as_deref().unwrap_or_default().trim().to_string(),
        instructions: fields.instructions.trim().to_string(),
        file_path: fields.file_path.clone().unwrap_or_default(),
        row_limit: non_blank(fields.row_limit.as_deref()).and_then(parse_row_limit),
        additional_columns: fields
            .additional_columns
            .iter()
            .map(|c| AdditionalColumn {
                name: c.name.trim().to_string(),
                instructions: c.instructions.trim().to_string(),
            })
            .collect(),
    })
}

/// Positive integer row limit, or `None` when `raw` is not one.
pub fn parse_row_limit(raw: &str) -> Option<NonZeroU64> {
    raw.trim().parse::<NonZeroU64>().ok()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Client-side check run before any upload request is sent.
pub fn check_upload_file(path: &Path, require_csv: bool) -> Result<(), UploadError> {
    let shown = path.display().to_string();
    if shown.is_empty() || !path.is_file() {
        return Err(UploadError::MissingFile(shown));
    }
    if require_csv {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(UploadError::NotCsv(shown));
        }
    }
    Ok(())
}
