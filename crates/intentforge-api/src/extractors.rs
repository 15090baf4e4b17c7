//! # Custom Extractors & Validation
//!
//! The [`Validate`] trait for request DTOs and helpers that extract and
//! validate JSON bodies in handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request types that check business rules beyond what serde enforces.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Amount(f64);

    impl Validate for Amount {
        fn validate(&self) -> Result<(), String> {
            if self.0 > 0.0 {
                Ok(())
            } else {
                Err("amount must be positive".to_string())
            }
        }
    }

    #[test]
    fn validated_json_rejects_business_rule_failures() {
        let err = extract_validated_json(Ok(Json(Amount(-1.0)))).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "amount must be positive"));
        assert!(extract_validated_json(Ok(Json(Amount(3.0)))).is_ok());
    }
}
