//! RS256 signer backed by `ring`.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use ring::{
	rand::SystemRandom,
	signature::{RSA_PKCS1_SHA256, RsaKeyPair},
};
// self
use crate::{
	_prelude::*,
	crypt::Signer,
	error::{MalformedError, SigningError},
};

const PKCS8_LABEL: &str = "PRIVATE KEY";
const PKCS1_LABEL: &str = "RSA PRIVATE KEY";

/// RSASSA-PKCS1-v1_5 with SHA-256 over a service-account private key.
#[derive(Clone)]
pub struct RsaSigner {
	key_pair: Arc<RsaKeyPair>,
	key_id: Option<String>,
	rng: SystemRandom,
}
impl RsaSigner {
	/// Parses a PEM-armored key (`PRIVATE KEY` or `RSA PRIVATE KEY`), as found in the
	/// `private_key` field of a service-account JSON file.
	pub fn from_pem(pem: &str, key_id: Option<String>) -> Result<Self, MalformedError> {
		let (label, der) = decode_pem(pem)?;

		match label.as_str() {
			PKCS8_LABEL => Self::from_pkcs8_der(&der, key_id),
			PKCS1_LABEL => Self::from_pkcs1_der(&der, key_id),
			other => Err(MalformedError::PrivateKey {
				reason: format!("unsupported PEM block `{other}`"),
			}),
		}
	}

	/// Builds a signer from a PKCS#8 DER document.
	pub fn from_pkcs8_der(der: &[u8], key_id: Option<String>) -> Result<Self, MalformedError> {
		let key_pair = RsaKeyPair::from_pkcs8(der)
			.map_err(|e| MalformedError::PrivateKey { reason: e.to_string() })?;

		Ok(Self::new(key_pair, key_id))
	}

	/// Builds a signer from a PKCS#1 `RSAPrivateKey` DER document.
	pub fn from_pkcs1_der(der: &[u8], key_id: Option<String>) -> Result<Self, MalformedError> {
		let key_pair = RsaKeyPair::from_der(der)
			.map_err(|e| MalformedError::PrivateKey { reason: e.to_string() })?;

		Ok(Self::new(key_pair, key_id))
	}

	/// DER-encoded `RSAPublicKey` matching this signer.
	pub fn public_key_der(&self) -> &[u8] {
		self.key_pair.public().as_ref()
	}

	fn new(key_pair: RsaKeyPair, key_id: Option<String>) -> Self {
		Self { key_pair: Arc::new(key_pair), key_id, rng: SystemRandom::new() }
	}
}
impl Signer for RsaSigner {
	fn key_id(&self) -> Option<&str> {
		self.key_id.as_deref()
	}

	fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
		let mut signature = vec![0; self.key_pair.public().modulus_len()];

		self.key_pair
			.sign(&RSA_PKCS1_SHA256, &self.rng, message, &mut signature)
			.map_err(|e| SigningError::new(e.to_string()))?;

		Ok(signature)
	}
}
impl Debug for RsaSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RsaSigner")
			.field("key_id", &self.key_id)
			.field("private_key", &"<redacted>")
			.finish()
	}
}

fn decode_pem(pem: &str) -> Result<(String, Vec<u8>), MalformedError> {
	let mut label = None;
	let mut body = String::new();

	for line in pem.lines().map(str::trim).filter(|line| !line.is_empty()) {
		if let Some(rest) = line.strip_prefix("-----BEGIN ") {
			label = rest.strip_suffix("-----").map(str::to_owned);
		} else if line.starts_with("-----END ") {
			break;
		} else if label.is_some() {
			body.push_str(line);
		}
	}

	let label = label
		.ok_or_else(|| MalformedError::PrivateKey { reason: "missing PEM header".into() })?;
	let der = STANDARD
		.decode(body)
		.map_err(|e| MalformedError::PrivateKey { reason: e.to_string() })?;

	Ok((label, der))
}
