//! Crate-level error types shared by the exchange protocol and the credential lifecycle.

// self
use crate::{_prelude::*, exchange::ResponsePayload};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential source data, claims, or a token response could not be understood.
	#[error(transparent)]
	Malformed(#[from] MalformedError),
	/// The signer failed to produce a signature.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Transport failure (DNS, TCP, TLS, deadline).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint refused to issue a token.
	#[error(transparent)]
	Refresh(#[from] RefreshError),

	/// The credential holds no access token yet.
	#[error("Credential has no access token; refresh it before use.")]
	TokenUnavailable,
}
impl Error {
	/// Returns `true` when the failure came from a transient token endpoint condition.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Refresh(RefreshError::Retryable { .. }))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Token endpoint URI cannot be parsed.
	#[error("Token URI `{uri}` is invalid.")]
	InvalidTokenUri {
		/// Rejected URI string.
		uri: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request header name or value is not valid HTTP.
	#[error("Header `{name}` cannot be sent.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Backoff parameters are out of range.
	#[error("Backoff parameters are invalid: {reason}.")]
	InvalidBackoff {
		/// Which constraint failed.
		reason: &'static str,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Service-account key file could not be read.
	#[error("Unable to read credential file `{path}`.")]
	ReadCredentialFile {
		/// Path that failed to open.
		path: String,
		/// Underlying I/O failure.
		#[source]
		source: std::io::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Input that does not have the expected shape. Never retried.
#[derive(Debug, ThisError)]
pub enum MalformedError {
	/// Service-account info lacks required fields.
	#[error("Service account info was not in the expected format, missing fields {fields}.")]
	MissingFields {
		/// Comma-separated list of the absent field names.
		fields: String,
	},
	/// Service-account info has the right fields but the wrong types.
	#[error("Service account info could not be deserialized.")]
	ServiceAccountInfo {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Private key material was rejected.
	#[error("Private key was rejected: {reason}.")]
	PrivateKey {
		/// Reason reported by the key parser.
		reason: String,
	},
	/// Claims or header could not be serialized to JSON.
	#[error("Assertion claims could not be serialized.")]
	Claims(#[source] serde_json::Error),
	/// Claims serialized to something other than a JSON object.
	#[error("Assertion claims must serialize to a JSON object.")]
	ClaimsNotObject,
	/// Token response carried an `expires_in` that is not an integer.
	#[error("Invalid format for `expires_in` response: {value}.")]
	ExpiresIn {
		/// Raw JSON value received.
		value: String,
	},
	/// Base64 input contained non-ASCII characters.
	#[error("Base64 input should contain only ASCII characters.")]
	NonAsciiBase64,
	/// Base64 input could not be decoded.
	#[error(transparent)]
	Base64(#[from] base64::DecodeError),
}

/// Signer failure.
#[derive(Debug, ThisError)]
#[error("Signer failed to produce a signature.")]
pub struct SigningError {
	#[source]
	source: BoxError,
}
impl SigningError {
	/// Wraps a signer-specific failure.
	pub fn new(src: impl Into<BoxError>) -> Self {
		Self { source: src.into() }
	}
}

/// Transport-level failures (network, IO, cancellation).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
	/// The caller-supplied deadline passed before the exchange finished.
	#[error("Deadline exceeded while calling the token endpoint.")]
	DeadlineExceeded,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Token endpoint refused to issue a token.
///
/// The variant encodes whether the failure was transient, so callers match on it instead of
/// inspecting a flag.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The endpoint reported a transient condition (and retries, if any, were exhausted).
	#[error("Token endpoint returned a retryable error: {details}.")]
	Retryable {
		/// Summary extracted from the response payload.
		details: String,
		/// HTTP status of the last response.
		status: u16,
		/// Last observed response payload.
		response: ResponsePayload,
	},
	/// The endpoint definitively rejected the request or its response was unusable.
	#[error("Token endpoint rejected the request: {details}.")]
	Terminal {
		/// Summary extracted from the response payload.
		details: String,
		/// HTTP status of the response.
		status: u16,
		/// Response payload that triggered the failure.
		response: ResponsePayload,
	},
}
impl RefreshError {
	/// Returns the HTTP status of the response behind this error.
	pub fn status(&self) -> u16 {
		match self {
			Self::Retryable { status, .. } | Self::Terminal { status, .. } => *status,
		}
	}

	/// Returns the response payload behind this error.
	pub fn response(&self) -> &ResponsePayload {
		match self {
			Self::Retryable { response, .. } | Self::Terminal { response, .. } => response,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_retryable_refresh_errors_report_retryable() {
		let retryable = Error::from(RefreshError::Retryable {
			details: "server_error: try later".into(),
			status: 503,
			response: ResponsePayload::Text("busy".into()),
		});
		let terminal = Error::from(RefreshError::Terminal {
			details: "invalid_grant: bad assertion".into(),
			status: 400,
			response: ResponsePayload::Text("nope".into()),
		});

		assert!(retryable.is_retryable());
		assert!(!terminal.is_retryable());
		assert!(!Error::from(TransportError::DeadlineExceeded).is_retryable());
	}

	#[test]
	fn refresh_error_exposes_status_and_payload() {
		let err = RefreshError::Terminal {
			details: "No access token in response".into(),
			status: 200,
			response: ResponsePayload::Text("{}".into()),
		};

		assert_eq!(err.status(), 200);
		assert_eq!(err.response(), &ResponsePayload::Text("{}".into()));
		assert_eq!(
			err.to_string(),
			"Token endpoint rejected the request: No access token in response."
		);
	}
}
