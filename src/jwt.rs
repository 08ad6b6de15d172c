//! Signed JWT assertions used as the OAuth 2.0 JWT-bearer grant.
//!
//! Header and payload are serialized independently to compact JSON, base64url-encoded, joined
//! with `.`, and signed. Given identical inputs and an identical signature the encoded output is
//! byte-for-byte stable; the [`Signer`] is the only source of non-determinism.

// self
use crate::{
	_prelude::*,
	crypt::Signer,
	encoding,
	error::MalformedError,
};

/// Signing algorithm written into the header unless the caller chose one.
pub const DEFAULT_ALGORITHM: &str = "RS256";

/// Fully signed assertion. Consumed by one token exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assertion {
	/// JOSE header (`typ`, `alg`, optional `kid`).
	pub header: Map<String, Value>,
	/// Claims set.
	pub payload: Map<String, Value>,
	/// Raw signature over the signing input.
	pub signature: Vec<u8>,
}
impl Assertion {
	/// Builds the header, signs the claims, and returns the assertion.
	///
	/// `key_id` overrides the signer's own key id. `claims` must serialize to a JSON object.
	pub fn sign<S, C>(
		signer: &S,
		claims: &C,
		header: Option<Map<String, Value>>,
		key_id: Option<&str>,
	) -> Result<Self>
	where
		S: ?Sized + Signer,
		C: ?Sized + Serialize,
	{
		let payload = match serde_json::to_value(claims).map_err(MalformedError::Claims)? {
			Value::Object(map) => map,
			_ => return Err(MalformedError::ClaimsNotObject.into()),
		};
		let mut header = header.unwrap_or_default();

		header.insert("typ".into(), "JWT".into());

		if !header.contains_key("alg") {
			header.insert("alg".into(), DEFAULT_ALGORITHM.into());
		}
		if let Some(kid) = key_id.or_else(|| signer.key_id()) {
			header.insert("kid".into(), kid.into());
		}

		let signing_input = signing_input(&header, &payload)?;
		let signature = signer.sign(signing_input.as_bytes())?;

		Ok(Self { header, payload, signature })
	}

	/// Encodes `base64url(header).base64url(payload).base64url(signature)`.
	pub fn encode(&self) -> Result<String> {
		let mut encoded = signing_input(&self.header, &self.payload)?;

		encoded.push('.');
		encoded.push_str(&encoding::base64url_encode(&self.signature));

		Ok(encoded)
	}
}

/// Convenience wrapper returning the encoded assertion bytes directly.
pub fn encode<S, C>(
	signer: &S,
	claims: &C,
	header: Option<Map<String, Value>>,
	key_id: Option<&str>,
) -> Result<Vec<u8>>
where
	S: ?Sized + Signer,
	C: ?Sized + Serialize,
{
	Ok(Assertion::sign(signer, claims, header, key_id)?.encode()?.into_bytes())
}

fn signing_input(header: &Map<String, Value>, payload: &Map<String, Value>) -> Result<String> {
	let header = serde_json::to_vec(header).map_err(MalformedError::Claims)?;
	let payload = serde_json::to_vec(payload).map_err(MalformedError::Claims)?;

	Ok(format!(
		"{}.{}",
		encoding::base64url_encode(header),
		encoding::base64url_encode(payload)
	))
}
