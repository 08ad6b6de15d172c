//! OAuth 2.0 token endpoint protocol: request construction, classification, and retries.
//!
//! [`token_endpoint_request`] performs one attempt, then keeps retrying transient failures on a
//! jittered [`ExponentialBackoff`] until the endpoint answers 200, fails definitively, or the
//! backoff runs dry. [`jwt_grant`] layers the JWT-bearer grant on top and extracts the token.

mod outcome;

pub use outcome::*;

// crates.io
use oauth2::{
	HttpRequest,
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, Request,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	backoff::ExponentialBackoff,
	encoding,
	error::{ConfigError, MalformedError, RefreshError, TransportError},
	http::{DEFAULT_TIMEOUT, TokenTransport},
	obs::{self, API_CLIENT_HEADER, ClientInfo, FlowKind, FlowOutcome, FlowSpan},
};

/// `Content-Type` of JSON request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// `Content-Type` of form request bodies.
pub const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Grant type of the JWT-bearer flow (RFC 7523).
pub const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Request body encodings accepted by token endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyEncoding {
	/// `application/x-www-form-urlencoded`, fields in insertion order.
	#[default]
	Form,
	/// `application/json` object.
	Json,
}

/// One token endpoint request and the policy used to retry it.
///
/// Caller [`headers`](Self::headers) are applied after the computed `Content-Type` and
/// `Authorization` headers and replace them when names collide.
#[derive(Clone, Debug)]
pub struct TokenRequest {
	/// Token endpoint.
	pub token_uri: Url,
	/// Body fields in the order they are encoded.
	pub body: Vec<(String, String)>,
	/// Bearer token sent in `Authorization`, when the endpoint needs one.
	pub access_token: Option<BearerToken>,
	/// Body encoding.
	pub encoding: BodyEncoding,
	/// Whether transient failures are retried.
	pub can_retry: bool,
	/// Extra headers, applied last.
	pub headers: Vec<(String, String)>,
	/// Per-attempt transport timeout.
	pub timeout: StdDuration,
	/// Deadline covering every attempt and every backoff wait.
	pub deadline: Option<Instant>,
	/// Retry schedule; rewound before use, so one template can serve many requests.
	pub backoff: ExponentialBackoff,
}
impl TokenRequest {
	/// Creates a form-encoded, retrying request with the default timeout.
	pub fn new(token_uri: Url) -> Self {
		Self {
			token_uri,
			body: Vec::new(),
			access_token: None,
			encoding: BodyEncoding::Form,
			can_retry: true,
			headers: Vec::new(),
			timeout: DEFAULT_TIMEOUT,
			deadline: None,
			backoff: ExponentialBackoff::default(),
		}
	}

	/// Creates the JWT-bearer grant request for `assertion`.
	pub fn jwt_bearer(
		token_uri: Url,
		assertion: impl Into<String>,
		client_info: &ClientInfo,
	) -> Self {
		Self::new(token_uri)
			.with_field("assertion", assertion)
			.with_field("grant_type", JWT_GRANT_TYPE)
			.with_header(API_CLIENT_HEADER, client_info.token_request_access_token_sa_assertion())
	}

	/// Appends a body field.
	pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.body.push((name.into(), value.into()));

		self
	}

	/// Sends `Authorization: Bearer <token>`.
	pub fn with_access_token(mut self, token: BearerToken) -> Self {
		self.access_token = Some(token);

		self
	}

	/// Overrides the body encoding.
	pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
		self.encoding = encoding;

		self
	}

	/// Enables or disables retries.
	pub fn with_retry(mut self, can_retry: bool) -> Self {
		self.can_retry = can_retry;

		self
	}

	/// Appends a header applied after the computed ones.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Overrides the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Bounds the whole exchange, retries included.
	pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
		self.deadline = deadline;

		self
	}

	/// Overrides the retry schedule.
	pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
		self.backoff = backoff;

		self
	}

	/// Builds the `POST` sent for each attempt.
	pub fn to_http_request(&self) -> Result<HttpRequest> {
		let (content_type, body) = match self.encoding {
			BodyEncoding::Form => (
				URLENCODED_CONTENT_TYPE,
				encoding::form_urlencode(self.body.iter().map(|(k, v)| (k, v))).into_bytes(),
			),
			BodyEncoding::Json => {
				let fields = self
					.body
					.iter()
					.map(|(k, v)| (k.clone(), Value::String(v.clone())))
					.collect::<Map<_, _>>();

				(JSON_CONTENT_TYPE, Value::Object(fields).to_string().into_bytes())
			},
		};
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

		if let Some(token) = &self.access_token {
			let value = header_value(AUTHORIZATION.as_str(), &token.authorization_value())?;

			headers.insert(AUTHORIZATION, value);
		}

		for (name, value) in &self.headers {
			let header_name = HeaderName::try_from(name.as_str())
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;

			headers.insert(header_name, header_value(name, value)?);
		}

		let mut request = Request::builder()
			.method(Method::POST)
			.uri(self.token_uri.as_str())
			.body(body)
			.map_err(ConfigError::from)?;

		*request.headers_mut() = headers;

		Ok(request)
	}
}

/// Token issued by a successful grant.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenGrant {
	/// Access token.
	pub access_token: BearerToken,
	/// Absolute expiry, when the endpoint reported `expires_in`.
	pub expiry: Option<OffsetDateTime>,
	/// Full response document.
	pub response: Map<String, Value>,
}

/// Performs `request` with retries and returns the JSON object of the 200 response.
///
/// Non-retryable failures, and any failure when retries are disabled, raise on the first
/// attempt without consuming backoff. Transport errors are never retried.
pub async fn token_endpoint_request<T>(
	transport: &T,
	request: &TokenRequest,
) -> Result<Map<String, Value>>
where
	T: ?Sized + TokenTransport,
{
	const KIND: FlowKind = FlowKind::TokenRequest;

	let span = FlowSpan::new(KIND, "token_endpoint_request");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span.instrument(request_with_retries(transport, request)).await;

	match &result {
		Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
	}

	result
}

/// Runs the JWT-bearer grant and extracts the access token and expiry.
///
/// A response without a string `access_token` is a terminal refresh error; an `expires_in` that
/// is neither a number nor an integer string is malformed.
pub async fn jwt_grant<T>(transport: &T, request: &TokenRequest) -> Result<TokenGrant>
where
	T: ?Sized + TokenTransport,
{
	let response = token_endpoint_request(transport, request).await?;
	let now = OffsetDateTime::now_utc();
	let access_token = match response.get("access_token").and_then(Value::as_str) {
		Some(token) => BearerToken::new(token),
		None =>
			return Err(RefreshError::Terminal {
				details: "No access token in response".into(),
				status: 200,
				response: ResponsePayload::Json(response),
			}
			.into()),
	};
	let expiry = match response.get("expires_in") {
		Some(value) => {
			let seconds = parse_expires_in(value)?;

			Some(now.checked_add(Duration::seconds(seconds)).ok_or_else(|| {
				MalformedError::ExpiresIn { value: value.to_string() }
			})?)
		},
		None => None,
	};

	Ok(TokenGrant { access_token, expiry, response })
}

async fn request_with_retries<T>(
	transport: &T,
	request: &TokenRequest,
) -> Result<Map<String, Value>>
where
	T: ?Sized + TokenTransport,
{
	let mut backoff = request.backoff.clone();
	let mut outcome = with_deadline(request.deadline, attempt(transport, request)).await?;

	backoff.start();

	loop {
		let (status, response) = match outcome {
			ExchangeOutcome::Success { response: ResponsePayload::Json(map), .. } => return Ok(map),
			ExchangeOutcome::RetryableFailure { status, response } if request.can_retry =>
				(status, response),
			failure => return Err(failure.into_error().into()),
		};
		let next = with_deadline(request.deadline, async { Ok(backoff.next().await) }).await?;
		let Some(retry) = next else {
			return Err(RefreshError::Retryable { details: response.details(), status, response }
				.into());
		};

		obs::trace_retry(retry, status, &response.details());
		obs::record_flow_outcome(FlowKind::TokenRequest, FlowOutcome::Retry);

		outcome = with_deadline(request.deadline, attempt(transport, request)).await?;
	}
}

async fn attempt<T>(transport: &T, request: &TokenRequest) -> Result<ExchangeOutcome>
where
	T: ?Sized + TokenTransport,
{
	let response = transport.send(request.to_http_request()?, request.timeout).await?;
	let payload = ResponsePayload::from_body(response.body());

	Ok(ExchangeOutcome::classify(response.status().as_u16(), payload))
}

async fn with_deadline<F, O>(deadline: Option<Instant>, fut: F) -> Result<O>
where
	F: Future<Output = Result<O>>,
{
	match deadline {
		Some(deadline) => tokio::time::timeout_at(deadline, fut)
			.await
			.map_err(|_| Error::from(TransportError::DeadlineExceeded))?,
		None => fut.await,
	}
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::try_from(value).map_err(|_| ConfigError::InvalidHeader { name: name.into() })
}

fn parse_expires_in(value: &Value) -> Result<i64, MalformedError> {
	// Some endpoints send `expires_in` as a JSON string.
	let seconds = match value {
		Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	};

	seconds.ok_or_else(|| MalformedError::ExpiresIn { value: value.to_string() })
}
