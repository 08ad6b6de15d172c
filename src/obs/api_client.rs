// self
use crate::_prelude::*;

/// Header used to attribute token requests to a client library.
pub const API_CLIENT_HEADER: &str = "x-goog-api-client";

const REQUEST_TYPE_ACCESS_TOKEN: &str = "auth-request-type/at";
const CRED_TYPE_SA_ASSERTION: &str = "cred-type/sa";

/// Runtime and library versions reported in [`API_CLIENT_HEADER`].
///
/// Built once and passed by value; nothing reads process-global state after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientInfo {
	runtime: Cow<'static, str>,
	library: Cow<'static, str>,
}
impl ClientInfo {
	/// Reports explicit runtime and library versions.
	pub fn new(
		runtime: impl Into<Cow<'static, str>>,
		library: impl Into<Cow<'static, str>>,
	) -> Self {
		Self { runtime: runtime.into(), library: library.into() }
	}

	/// Reports the minimum supported Rust version and this crate's version.
	pub fn detect() -> Self {
		Self::new(env!("CARGO_PKG_RUST_VERSION"), env!("CARGO_PKG_VERSION"))
	}

	/// Header value for a service-account assertion access-token request.
	pub fn token_request_access_token_sa_assertion(&self) -> String {
		format!("{self} {REQUEST_TYPE_ACCESS_TOKEN} {CRED_TYPE_SA_ASSERTION}")
	}
}
impl Default for ClientInfo {
	fn default() -> Self {
		Self::detect()
	}
}
impl Display for ClientInfo {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "gl-rust/{} auth/{}", self.runtime, self.library)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sa_assertion_header_layout() {
		let info = ClientInfo::new("1.85", "0.1.0");

		assert_eq!(
			info.token_request_access_token_sa_assertion(),
			"gl-rust/1.85 auth/0.1.0 auth-request-type/at cred-type/sa"
		);
	}

	#[test]
	fn detected_versions_come_from_the_package() {
		let header = ClientInfo::detect().token_request_access_token_sa_assertion();

		assert!(header.starts_with(&format!("gl-rust/{} ", env!("CARGO_PKG_RUST_VERSION"))));
		assert!(header.contains(&format!("auth/{}", env!("CARGO_PKG_VERSION"))));
	}
}
