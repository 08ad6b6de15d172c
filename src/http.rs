//! Transport seam for token endpoint calls.
//!
//! [`TokenTransport`] is the crate's only dependency on an HTTP stack. Implementations send one
//! request and hand back whatever the server answered: a non-200 status is a response, not a
//! transport error. Classification and retries happen in [`exchange`](crate::exchange).

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::{_prelude::*, error::TransportError};

/// Timeout applied to each token endpoint call unless the request overrides it.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(120);

/// Boxed future returned by [`TokenTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// HTTP transport capable of executing token endpoint requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by many
/// credentials behind an `Arc`.
pub trait TokenTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the full response, bounded by `timeout`.
	fn send(&self, request: HttpRequest, timeout: StdDuration) -> TransportFuture<'_>;
}
impl<T> TokenTransport for Arc<T>
where
	T: ?Sized + TokenTransport,
{
	fn send(&self, request: HttpRequest, timeout: StdDuration) -> TransportFuture<'_> {
		(**self).send(request, timeout)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints answer directly, so a client built with [`new`](Self::new) never follows
/// redirects. Configure any custom [`ReqwestClient`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client with redirects disabled.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest, timeout: StdDuration) -> TransportFuture<'_> {
		Box::pin(async move {
			let mut request: reqwest::Request = request.try_into()?;

			*request.timeout_mut() = Some(timeout);

			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
