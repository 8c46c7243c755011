//! Incoming text fields follow one convention: trim, then treat empty as absent.

use crate::error::{Error, Result};

/// Trimmed value, or `None` when the field is missing or blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Names every blank field in `fields`, failing with one validation error.
pub fn require_fields<'a>(fields: &[(&str, Option<&'a str>)]) -> Result<Vec<&'a str>> {
    let mut values = Vec::with_capacity(fields.len());
    let mut missing = Vec::new();
    for (name, value) in fields {
        match non_blank(*value) {
            Some(v) => values.push(v),
            None => missing.push(*name),
        }
    }

    if missing.is_empty() {
        Ok(values)
    } else {
        Err(Error::validation(format!(
            "the following fields are required: {}",
            missing.join(", ")
        )))
    }
}
