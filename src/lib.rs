//! Service-account token refresh for Rust: sign JWT-bearer assertions, exchange them at an OAuth
//! 2.0 token endpoint with jittered retries, and keep access tokens fresh.
//!
//! The crate is organised leaves first:
//!
//! - [`encoding`] provides byte-exact base64url and form encoders.
//! - [`crypt`] defines the [`Signer`](crypt::Signer) capability and a `ring`-backed RSA signer.
//! - [`jwt`] builds the signed [`Assertion`](jwt::Assertion) presented as the grant.
//! - [`backoff`] yields jittered, exponentially growing retry waits.
//! - [`http`] is the transport seam, with a reqwest implementation behind the `reqwest` feature.
//! - [`exchange`] performs token endpoint requests, classifies outcomes, and retries.
//! - [`credential`] owns the token/expiry pair and its freshness state machine.
//!
//! [`auth`] holds the scope and token value types, [`obs`] the optional `tracing`/`metrics`
//! instrumentation.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod backoff;
pub mod credential;
pub mod crypt;
pub mod encoding;
pub mod error;
pub mod exchange;
pub mod http;
pub mod jwt;
pub mod obs;

mod _prelude {
	pub use std::{
		borrow::Cow,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map, Value};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio::time::Instant;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, parking_lot as _};
