use std::borrow::Borrow;

use validator::ValidationError;

/// Rejects strings that are empty once surrounding whitespace is removed
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

pub fn finite_latitude(value: impl Borrow<f64>) -> Result<(), ValidationError> {
    let value = value.borrow();
    if value.is_finite() && (-90.0..=90.0).contains(value) {
        Ok(())
    } else {
        Err(ValidationError::new("latitude_out_of_range"))
    }
}

pub fn finite_longitude(value: impl Borrow<f64>) -> Result<(), ValidationError> {
    let value = value.borrow();
    if value.is_finite() && (-180.0..=180.0).contains(value) {
        Ok(())
    } else {
        Err(ValidationError::new("longitude_out_of_range"))
    }
}

/// Flatten `validator` errors into `field: code` messages
pub fn describe_errors(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| errs.iter().map(move |e| format!("{}: {}", field, e.code)))
        .collect();
    parts.sort();
    parts.join(", ")
}
