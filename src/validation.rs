//! Client-side checks that run before any network call.

use time::Date;

use crate::api::ApiError;

pub fn required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "is required"));
    }
    Ok(())
}

pub fn max_chars(field: &str, value: &str, limit: usize) -> Result<(), ApiError> {
    if value.chars().count() > limit {
        return Err(ApiError::validation(
            field,
            format!("must be at most {limit} characters"),
        ));
    }
    Ok(())
}

pub fn confirmation(field: &str, value: &str, confirm: &str) -> Result<(), ApiError> {
    if value != confirm {
        return Err(ApiError::validation(field, "confirmation does not match"));
    }
    Ok(())
}

pub fn date_order(field: &str, from: Date, to: Date) -> Result<(), ApiError> {
    if from > to {
        return Err(ApiError::validation(
            field,
            format!("start date {from} is after end date {to}"),
        ));
    }
    Ok(())
}
