use crate::client::{ApiError, ApiResult};
use log::error;
use serde::de::DeserializeOwned;

/// Check an untyped JSON payload against the expected wire shape.
///
/// The serde error is logged for diagnostics; callers only ever see
/// `ApiError::Validation`, which names the response but not the internals.
pub fn validate_response<T: DeserializeOwned>(
    data: serde_json::Value,
    context: &'static str,
) -> ApiResult<T> {
    serde_json::from_value(data).map_err(|e| {
        error!("{context} validation failed: {e}");
        ApiError::Validation { context }
    })
}
