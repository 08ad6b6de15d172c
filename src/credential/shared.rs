//! Single-flight access to one credential from many tasks.

// crates.io
use oauth2::http::HeaderMap;
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	credential::{Credential, RefreshMetrics, TokenState},
	http::TokenTransport,
};

/// [`Credential`] behind an async mutex.
///
/// Callers that queue behind an in-flight refresh find the new token once they acquire the lock
/// and reuse it, so concurrent demand produces one token request.
#[derive(Debug)]
pub struct SharedCredential {
	inner: AsyncMutex<Credential>,
	metrics: RefreshMetrics,
}
impl SharedCredential {
	/// Wraps `credential`.
	pub fn new(credential: Credential) -> Self {
		Self { inner: AsyncMutex::new(credential), metrics: RefreshMetrics::default() }
	}

	/// Returns a fresh token, refreshing first unless the current one is
	/// [`Fresh`](TokenState::Fresh).
	pub async fn access_token<T>(&self, transport: &T) -> Result<BearerToken>
	where
		T: ?Sized + TokenTransport,
	{
		self.token(transport, false).await
	}

	/// Refreshes regardless of the current state and returns the new token.
	pub async fn force_refresh<T>(&self, transport: &T) -> Result<BearerToken>
	where
		T: ?Sized + TokenTransport,
	{
		self.token(transport, true).await
	}

	/// Ensures a fresh token and writes `authorization: Bearer <token>` into `headers`.
	pub async fn apply<T>(&self, transport: &T, headers: &mut HeaderMap) -> Result<()>
	where
		T: ?Sized + TokenTransport,
	{
		self.metrics.record_attempt();

		let mut credential = self.inner.lock().await;

		self.ensure_fresh(&mut credential, transport, false).await?;

		credential.apply(headers)
	}

	/// Clone of the wrapped credential.
	pub async fn snapshot(&self) -> Credential {
		self.inner.lock().await.clone()
	}

	/// Counters for this credential.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Unwraps the credential.
	pub fn into_inner(self) -> Credential {
		self.inner.into_inner()
	}

	async fn token<T>(&self, transport: &T, force: bool) -> Result<BearerToken>
	where
		T: ?Sized + TokenTransport,
	{
		self.metrics.record_attempt();

		let mut credential = self.inner.lock().await;

		self.ensure_fresh(&mut credential, transport, force).await?;

		credential.token().cloned().ok_or(Error::TokenUnavailable)
	}

	async fn ensure_fresh<T>(
		&self,
		credential: &mut Credential,
		transport: &T,
		force: bool,
	) -> Result<()>
	where
		T: ?Sized + TokenTransport,
	{
		if !force && credential.token_state() == TokenState::Fresh {
			self.metrics.record_success();

			return Ok(());
		}

		self.metrics.record_refresh();

		match credential.refresh(transport).await {
			Ok(()) => {
				self.metrics.record_success();

				Ok(())
			},
			Err(e) => {
				self.metrics.record_failure();

				Err(e)
			},
		}
	}
}
impl From<Credential> for SharedCredential {
	fn from(credential: Credential) -> Self {
		Self::new(credential)
	}
}
