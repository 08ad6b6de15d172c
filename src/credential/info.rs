//! Service-account key file parsing.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, MalformedError},
};

const REQUIRED_FIELDS: [&str; 4] = ["client_email", "private_key", "private_key_id", "token_uri"];

/// Contents of a service-account JSON key file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountInfo {
	/// Credential type, `service_account` for files issued by the console.
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	/// Service account email, used as the assertion issuer.
	pub client_email: String,
	/// Token endpoint the assertion is exchanged at.
	pub token_uri: String,
	/// PEM-armored private key.
	pub private_key: String,
	/// Identifier of the private key, written into the `kid` header.
	pub private_key_id: Option<String>,
	/// Project the account belongs to.
	#[serde(default)]
	pub project_id: Option<String>,
	/// Numeric client identifier.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Regions the credential may be used in.
	#[serde(default)]
	pub trust_boundary: Option<TrustBoundary>,
}
impl ServiceAccountInfo {
	/// Parses an already decoded JSON document.
	///
	/// Every absent required field is reported at once.
	pub fn from_value(value: Value) -> Result<Self, MalformedError> {
		let missing = REQUIRED_FIELDS
			.into_iter()
			.filter(|field| value.get(field).is_none())
			.collect::<Vec<_>>();

		if !missing.is_empty() {
			return Err(MalformedError::MissingFields { fields: missing.join(", ") });
		}

		serde_path_to_error::deserialize(value)
			.map_err(|source| MalformedError::ServiceAccountInfo { source })
	}

	/// Parses a JSON string.
	pub fn from_json(json: &str) -> Result<Self, MalformedError> {
		let value = serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_str(json))
			.map_err(|source| MalformedError::ServiceAccountInfo { source })?;

		Self::from_value(value)
	}

	/// Reads and parses a key file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let json = fs::read_to_string(path).map_err(|source| ConfigError::ReadCredentialFile {
			path: path.display().to_string(),
			source,
		})?;

		Ok(Self::from_json(&json)?)
	}
}
impl Debug for ServiceAccountInfo {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceAccountInfo")
			.field("kind", &self.kind)
			.field("client_email", &self.client_email)
			.field("token_uri", &self.token_uri)
			.field("private_key", &"<redacted>")
			.field("private_key_id", &self.private_key_id)
			.field("project_id", &self.project_id)
			.field("client_id", &self.client_id)
			.field("trust_boundary", &self.trust_boundary)
			.finish()
	}
}

/// Locations a credential is allowed to operate in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustBoundary {
	/// Human-readable location names.
	#[serde(default)]
	pub locations: Vec<String>,
	/// Encoded form sent to servers; `0x0` means unrestricted.
	#[serde(default = "TrustBoundary::unrestricted_encoding")]
	pub encoded_locations: String,
}
impl TrustBoundary {
	fn unrestricted_encoding() -> String {
		"0x0".into()
	}
}
impl Default for TrustBoundary {
	fn default() -> Self {
		Self { locations: Vec::new(), encoded_locations: Self::unrestricted_encoding() }
	}
}
