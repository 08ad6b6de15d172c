//! Service-account credentials and their freshness state machine.
//!
//! A [`Credential`] starts without a token. [`Credential::refresh`] signs a fresh assertion,
//! runs the JWT-bearer grant, and replaces token and expiry together; nothing else mutates
//! them. Freshness is a pure function of `(token, expiry, now)`:
//!
//! | token | expiry                           | state                   |
//! |-------|----------------------------------|-------------------------|
//! | none  | any                              | [`TokenState::Invalid`] |
//! | some  | none                             | [`TokenState::Fresh`]   |
//! | some  | `now >= expiry`                  | [`TokenState::Invalid`] |
//! | some  | `now >= expiry - 3m45s`          | [`TokenState::Stale`]   |
//! | some  | otherwise                        | [`TokenState::Fresh`]   |

mod info;
mod metrics;
mod shared;

pub use info::*;
pub use metrics::RefreshMetrics;
pub use shared::SharedCredential;

// crates.io
use oauth2::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{BearerToken, ScopeSet},
	backoff::ExponentialBackoff,
	crypt::{RsaSigner, Signer},
	error::ConfigError,
	exchange::{self, TokenRequest},
	http::{DEFAULT_TIMEOUT, TokenTransport},
	jwt::Assertion,
	obs::{self, ClientInfo, FlowKind, FlowOutcome, FlowSpan},
};

/// Google's OAuth 2.0 token endpoint, also the audience of every assertion.
pub const GOOGLE_OAUTH2_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
/// Lifetime requested for each assertion.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(1);
/// Window before expiry in which a token counts as stale.
pub const REFRESH_THRESHOLD: Duration = Duration::seconds(225);

/// Freshness of a credential's token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenState {
	/// Usable, no refresh needed.
	Fresh,
	/// Usable, but close enough to expiry that a refresh is due.
	Stale,
	/// Absent or expired.
	Invalid,
}

/// Service-account credential.
#[derive(Clone)]
pub struct Credential {
	token: Option<BearerToken>,
	expiry: Option<OffsetDateTime>,
	scopes: ScopeSet,
	default_scopes: ScopeSet,
	signer: Arc<dyn Signer>,
	token_uri: Url,
	service_account_email: String,
	subject: Option<String>,
	project_id: Option<String>,
	additional_claims: Map<String, Value>,
	trust_boundary: TrustBoundary,
	backoff: ExponentialBackoff,
	retry_enabled: bool,
	timeout: StdDuration,
	client_info: ClientInfo,
}
impl Credential {
	/// Starts a builder from an explicit signer and service-account email.
	pub fn builder(
		signer: Arc<dyn Signer>,
		service_account_email: impl Into<String>,
	) -> CredentialBuilder {
		CredentialBuilder::new(signer, service_account_email)
	}

	/// Current access token, if any.
	pub fn token(&self) -> Option<&BearerToken> {
		self.token.as_ref()
	}

	/// Expiry of the current token; `None` means it never expires.
	pub fn expiry(&self) -> Option<OffsetDateTime> {
		self.expiry
	}

	/// Requested scopes.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// Scopes used when none were requested.
	pub fn default_scopes(&self) -> &ScopeSet {
		&self.default_scopes
	}

	/// Scopes written into the assertion: the requested ones, or the defaults when none were
	/// requested.
	pub fn effective_scopes(&self) -> &ScopeSet {
		if self.scopes.is_empty() { &self.default_scopes } else { &self.scopes }
	}

	/// Token endpoint.
	pub fn token_uri(&self) -> &Url {
		&self.token_uri
	}

	/// Service account email, the assertion issuer.
	pub fn service_account_email(&self) -> &str {
		&self.service_account_email
	}

	/// User impersonated through domain-wide delegation.
	pub fn subject(&self) -> Option<&str> {
		self.subject.as_deref()
	}

	/// Project the account belongs to.
	pub fn project_id(&self) -> Option<&str> {
		self.project_id.as_deref()
	}

	/// Claims merged over the standard ones.
	pub fn additional_claims(&self) -> &Map<String, Value> {
		&self.additional_claims
	}

	/// Regions the credential may be used in.
	pub fn trust_boundary(&self) -> &TrustBoundary {
		&self.trust_boundary
	}

	/// Signer producing assertion signatures.
	pub fn signer(&self) -> &Arc<dyn Signer> {
		&self.signer
	}

	/// Signs arbitrary bytes with the service-account key.
	pub fn sign_bytes(&self, message: &[u8]) -> Result<Vec<u8>> {
		Ok(self.signer.sign(message)?)
	}

	/// Freshness at `now`.
	pub fn token_state_at(&self, now: OffsetDateTime) -> TokenState {
		if self.token.is_none() {
			return TokenState::Invalid;
		}

		let Some(expiry) = self.expiry else {
			return TokenState::Fresh;
		};

		if now >= expiry {
			TokenState::Invalid
		} else if now >= expiry - REFRESH_THRESHOLD {
			TokenState::Stale
		} else {
			TokenState::Fresh
		}
	}

	/// Freshness now.
	pub fn token_state(&self) -> TokenState {
		self.token_state_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` when the token is usable ([`Fresh`](TokenState::Fresh) or
	/// [`Stale`](TokenState::Stale)).
	pub fn valid(&self) -> bool {
		matches!(self.token_state(), TokenState::Fresh | TokenState::Stale)
	}

	/// Returns `true` when no scopes were requested.
	pub fn requires_scopes(&self) -> bool {
		self.scopes.is_empty()
	}

	/// Returns `true` when the effective scopes cover every scope in `scopes`.
	pub fn has_scopes<I, S>(&self, scopes: I) -> bool
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let effective = self.effective_scopes();

		scopes.into_iter().all(|scope| effective.contains(scope.as_ref()))
	}

	/// Builds and signs the assertion presented to the token endpoint, issued at `now`.
	pub fn make_authorization_grant_assertion(&self, now: OffsetDateTime) -> Result<String> {
		let mut claims = Map::new();

		claims.insert("iat".into(), now.unix_timestamp().into());
		claims.insert("exp".into(), (now + DEFAULT_TOKEN_LIFETIME).unix_timestamp().into());
		claims.insert("iss".into(), self.service_account_email.clone().into());
		claims.insert("aud".into(), GOOGLE_OAUTH2_TOKEN_ENDPOINT.into());
		claims.insert("scope".into(), self.effective_scopes().joined().into());
		claims.extend(self.additional_claims.iter().map(|(k, v)| (k.clone(), v.clone())));

		// The subject is a user email for domain-wide delegation.
		if let Some(subject) = &self.subject {
			claims.entry("sub").or_insert_with(|| subject.clone().into());
		}

		Assertion::sign(&*self.signer, &claims, None, None)?.encode()
	}

	/// Obtains a new token and replaces token and expiry together.
	///
	/// On failure the credential is left untouched.
	pub async fn refresh<T>(&mut self, transport: &T) -> Result<()>
	where
		T: ?Sized + TokenTransport,
	{
		self.refresh_until(transport, None).await
	}

	/// [`refresh`](Self::refresh) bounded by `deadline`, retries and backoff waits included.
	///
	/// Expiry raises [`TransportError::DeadlineExceeded`](crate::error::TransportError).
	pub async fn refresh_with_deadline<T>(&mut self, transport: &T, deadline: Instant) -> Result<()>
	where
		T: ?Sized + TokenTransport,
	{
		self.refresh_until(transport, Some(deadline)).await
	}

	/// Writes `authorization: Bearer <token>` into `headers`.
	pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
		let token = self.token.as_ref().ok_or(Error::TokenUnavailable)?;
		let value = HeaderValue::try_from(token.authorization_value()).map_err(|_| {
			ConfigError::InvalidHeader { name: AUTHORIZATION.as_str().into() }
		})?;

		headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	/// Copy with new scopes and default scopes, without a token.
	pub fn with_scopes(&self, scopes: ScopeSet, default_scopes: ScopeSet) -> Self {
		Self { scopes, default_scopes, ..self.untokened() }
	}

	/// Copy impersonating `subject`, without a token.
	pub fn with_subject(&self, subject: impl Into<String>) -> Self {
		Self { subject: Some(subject.into()), ..self.untokened() }
	}

	/// Copy with `claims` merged over the existing additional claims, without a token.
	pub fn with_additional_claims(&self, claims: Map<String, Value>) -> Self {
		let mut derived = self.untokened();

		derived.additional_claims.extend(claims);

		derived
	}

	async fn refresh_until<T>(&mut self, transport: &T, deadline: Option<Instant>) -> Result<()>
	where
		T: ?Sized + TokenTransport,
	{
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let assertion = self.make_authorization_grant_assertion(OffsetDateTime::now_utc())?;
				let request =
					TokenRequest::jwt_bearer(self.token_uri.clone(), assertion, &self.client_info)
						.with_retry(self.retry_enabled)
						.with_timeout(self.timeout)
						.with_deadline(deadline)
						.with_backoff(self.backoff.clone());
				let grant = exchange::jwt_grant(transport, &request).await?;

				self.token = Some(grant.access_token);
				self.expiry = grant.expiry;

				Ok(())
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	fn untokened(&self) -> Self {
		Self { token: None, expiry: None, ..self.clone() }
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token", &self.token)
			.field("expiry", &self.expiry)
			.field("scopes", &self.scopes)
			.field("default_scopes", &self.default_scopes)
			.field("signer_key_id", &self.signer.key_id())
			.field("token_uri", &self.token_uri.as_str())
			.field("service_account_email", &self.service_account_email)
			.field("subject", &self.subject)
			.field("project_id", &self.project_id)
			.finish_non_exhaustive()
	}
}

/// Builder for [`Credential`] values.
pub struct CredentialBuilder {
	/// Signer producing assertion signatures.
	pub signer: Arc<dyn Signer>,
	/// Service account email.
	pub service_account_email: String,
	/// Token endpoint; defaults to [`GOOGLE_OAUTH2_TOKEN_ENDPOINT`].
	pub token_uri: Option<String>,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Scopes used when none are requested.
	pub default_scopes: Vec<String>,
	/// Subject for domain-wide delegation.
	pub subject: Option<String>,
	/// Project the account belongs to.
	pub project_id: Option<String>,
	/// Claims merged over the standard ones.
	pub additional_claims: Map<String, Value>,
	/// Trust boundary; unrestricted by default.
	pub trust_boundary: Option<TrustBoundary>,
	/// Pre-existing token and its expiry.
	pub token: Option<(BearerToken, Option<OffsetDateTime>)>,
	/// Retry schedule for token requests.
	pub backoff: ExponentialBackoff,
	/// Whether transient token endpoint failures are retried.
	pub retry_enabled: bool,
	/// Per-attempt transport timeout.
	pub timeout: StdDuration,
	/// Versions reported in the `x-goog-api-client` header.
	pub client_info: ClientInfo,
}
impl CredentialBuilder {
	/// Creates a builder with the defaults: Google token endpoint, no scopes, retries on.
	pub fn new(signer: Arc<dyn Signer>, service_account_email: impl Into<String>) -> Self {
		Self {
			signer,
			service_account_email: service_account_email.into(),
			token_uri: None,
			scopes: Vec::new(),
			default_scopes: Vec::new(),
			subject: None,
			project_id: None,
			additional_claims: Map::new(),
			trust_boundary: None,
			token: None,
			backoff: ExponentialBackoff::default(),
			retry_enabled: true,
			timeout: DEFAULT_TIMEOUT,
			client_info: ClientInfo::detect(),
		}
	}

	/// Seeds a builder from parsed service-account info.
	pub fn from_service_account_info(info: ServiceAccountInfo) -> Result<Self> {
		let signer = RsaSigner::from_pem(&info.private_key, info.private_key_id)?;
		let mut builder = Self::new(Arc::new(signer), info.client_email).token_uri(info.token_uri);

		builder.project_id = info.project_id;
		builder.trust_boundary = info.trust_boundary;

		Ok(builder)
	}

	/// Seeds a builder from a service-account JSON string.
	pub fn from_service_account_json(json: &str) -> Result<Self> {
		Self::from_service_account_info(ServiceAccountInfo::from_json(json)?)
	}

	/// Seeds a builder from a service-account key file.
	pub fn from_service_account_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
		Self::from_service_account_info(ServiceAccountInfo::from_file(path)?)
	}

	/// Overrides the token endpoint.
	pub fn token_uri(mut self, uri: impl Into<String>) -> Self {
		self.token_uri = Some(uri.into());

		self
	}

	/// Sets the requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Sets the scopes used when none are requested.
	pub fn default_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.default_scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Impersonates `subject` through domain-wide delegation.
	pub fn subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());

		self
	}

	/// Sets the project.
	pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
		self.project_id = Some(project_id.into());

		self
	}

	/// Adds one claim merged over the standard ones.
	pub fn additional_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.additional_claims.insert(name.into(), value.into());

		self
	}

	/// Starts from an existing token.
	pub fn token(mut self, token: BearerToken, expiry: Option<OffsetDateTime>) -> Self {
		self.token = Some((token, expiry));

		self
	}

	/// Overrides the retry schedule.
	pub fn backoff(mut self, backoff: ExponentialBackoff) -> Self {
		self.backoff = backoff;

		self
	}

	/// Enables or disables retries.
	pub fn retry(mut self, enabled: bool) -> Self {
		self.retry_enabled = enabled;

		self
	}

	/// Overrides the per-attempt timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the reported client versions.
	pub fn client_info(mut self, client_info: ClientInfo) -> Self {
		self.client_info = client_info;

		self
	}

	/// Validates the configuration.
	pub fn build(self) -> Result<Credential> {
		let raw_uri = self.token_uri.as_deref().unwrap_or(GOOGLE_OAUTH2_TOKEN_ENDPOINT);
		let token_uri = Url::parse(raw_uri)
			.map_err(|source| ConfigError::InvalidTokenUri { uri: raw_uri.into(), source })?;
		let scopes = ScopeSet::new(self.scopes).map_err(ConfigError::from)?;
		let default_scopes = ScopeSet::new(self.default_scopes).map_err(ConfigError::from)?;
		let (token, expiry) = match self.token {
			Some((token, expiry)) => (Some(token), expiry),
			None => (None, None),
		};

		Ok(Credential {
			token,
			expiry,
			scopes,
			default_scopes,
			signer: self.signer,
			token_uri,
			service_account_email: self.service_account_email,
			subject: self.subject,
			project_id: self.project_id,
			additional_claims: self.additional_claims,
			trust_boundary: self.trust_boundary.unwrap_or_default(),
			backoff: self.backoff,
			retry_enabled: self.retry_enabled,
			timeout: self.timeout,
			client_info: self.client_info,
		})
	}
}
impl Debug for CredentialBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialBuilder")
			.field("service_account_email", &self.service_account_email)
			.field("token_uri", &self.token_uri)
			.field("scopes", &self.scopes)
			.finish_non_exhaustive()
	}
}
