//! Response envelope shared by every service endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ApiError, Result, WeubError};

/// `{ data, statusCode, error }` wrapper around every JSON payload.
///
/// A present `error` is a logical failure even when the HTTP status is 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Error object as sent by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, turning a present `error` into [`WeubError::Api`].
    pub fn into_result(self) -> Result<T> {
        if let Some(body) = self.error {
            let mut err = ApiError::from(body);
            err.status = self.status_code;
            return Err(WeubError::Api(err));
        }
        self.data
            .ok_or_else(|| WeubError::Client("response envelope carried no data".into()))
    }
}
