//! Response payloads and their classification.

// self
use crate::{_prelude::*, error::RefreshError};

/// HTTP statuses that mark a failure as transient.
pub const RETRYABLE_STATUS_CODES: [u16; 4] = [500, 503, 408, 429];

// RFC 6749 section 4.1.2.1; redirected errors arrive without a 5xx status.
const RETRYABLE_ERROR_CODES: [&str; 3] =
	["internal_failure", "server_error", "temporarily_unavailable"];

/// Token endpoint response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponsePayload {
	/// Body parsed as a JSON object.
	Json(Map<String, Value>),
	/// Body kept as text because it was not a JSON object.
	Text(String),
}
impl ResponsePayload {
	/// Decodes a body as UTF-8 (lossy) and parses it as a JSON object when possible.
	pub fn from_body(body: &[u8]) -> Self {
		let text = String::from_utf8_lossy(body);

		match serde_json::from_str(&text) {
			Ok(Value::Object(map)) => Self::Json(map),
			_ => Self::Text(text.into_owned()),
		}
	}

	/// Returns the JSON object, if the body was one.
	pub fn as_json(&self) -> Option<&Map<String, Value>> {
		match self {
			Self::Json(map) => Some(map),
			Self::Text(_) => None,
		}
	}

	/// Human-readable summary used in error messages.
	///
	/// `"{error}: {error_description}"` when both fields exist, otherwise the whole document or
	/// the raw text.
	pub fn details(&self) -> String {
		match self {
			Self::Text(text) => text.clone(),
			Self::Json(map) => match (map.get("error"), map.get("error_description")) {
				(Some(error), Some(description)) =>
					format!("{}: {}", plain(error), plain(description)),
				_ => Value::Object(map.clone()).to_string(),
			},
		}
	}
}

/// Classified result of one token endpoint attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum ExchangeOutcome {
	/// HTTP 200.
	Success {
		/// HTTP status.
		status: u16,
		/// Response body.
		response: ResponsePayload,
	},
	/// Transient failure worth retrying.
	RetryableFailure {
		/// HTTP status.
		status: u16,
		/// Response body.
		response: ResponsePayload,
	},
	/// Definitive failure.
	TerminalFailure {
		/// HTTP status.
		status: u16,
		/// Response body.
		response: ResponsePayload,
	},
}
impl ExchangeOutcome {
	/// Classifies a response by status and, for JSON bodies, by the OAuth `error` fields.
	pub fn classify(status: u16, response: ResponsePayload) -> Self {
		if status == 200 {
			Self::Success { status, response }
		} else if is_retryable(status, &response) {
			Self::RetryableFailure { status, response }
		} else {
			Self::TerminalFailure { status, response }
		}
	}

	/// HTTP status of the attempt.
	pub fn status(&self) -> u16 {
		match self {
			Self::Success { status, .. }
			| Self::RetryableFailure { status, .. }
			| Self::TerminalFailure { status, .. } => *status,
		}
	}

	/// Response body of the attempt.
	pub fn response(&self) -> &ResponsePayload {
		match self {
			Self::Success { response, .. }
			| Self::RetryableFailure { response, .. }
			| Self::TerminalFailure { response, .. } => response,
		}
	}

	/// Converts the outcome into the matching refresh error.
	///
	/// Only [`RetryableFailure`](Self::RetryableFailure) maps to a retryable error; a success
	/// that reaches this point carried an unusable body and is terminal.
	pub fn into_error(self) -> RefreshError {
		match self {
			Self::RetryableFailure { status, response } =>
				RefreshError::Retryable { details: response.details(), status, response },
			Self::Success { status, response } | Self::TerminalFailure { status, response } =>
				RefreshError::Terminal { details: response.details(), status, response },
		}
	}
}

/// Returns `true` when a non-200 response describes a transient condition.
///
/// Text bodies are judged by status alone.
pub fn is_retryable(status: u16, response: &ResponsePayload) -> bool {
	if RETRYABLE_STATUS_CODES.contains(&status) {
		return true;
	}

	response.as_json().is_some_and(|map| {
		["error", "error_description"].into_iter().any(|key| {
			map.get(key)
				.and_then(Value::as_str)
				.is_some_and(|code| RETRYABLE_ERROR_CODES.contains(&code))
		})
	})
}

fn plain(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
