//! Byte-exact encoders used inside signed payloads and token request bodies.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use url::form_urlencoded;
// self
use crate::{_prelude::*, error::MalformedError};

/// Encodes bytes with the URL-safe alphabet and strips all `=` padding.
pub fn base64url_encode(value: impl AsRef<[u8]>) -> String {
	URL_SAFE_NO_PAD.encode(value)
}

/// Decodes URL-safe base64 that may lack its padding.
///
/// Input must be ASCII; padding is restored before decoding.
pub fn base64url_decode(value: impl AsRef<[u8]>) -> Result<Vec<u8>, MalformedError> {
	let value = value.as_ref();

	if !value.is_ascii() {
		return Err(MalformedError::NonAsciiBase64);
	}

	let mut padded = Vec::with_capacity(value.len() + 3);

	padded.extend_from_slice(value);
	padded.resize(value.len().next_multiple_of(4), b'=');

	Ok(URL_SAFE.decode(padded)?)
}

/// Serializes key/value pairs as `application/x-www-form-urlencoded`.
///
/// ASCII letters, digits and `_.-` are kept, space becomes `+`, every other byte is
/// percent-encoded. Pairs keep their iteration order.
pub fn form_urlencode<I, K, V>(pairs: I) -> String
where
	I: IntoIterator<Item = (K, V)>,
	K: AsRef<[u8]>,
	V: AsRef<[u8]>,
{
	let mut buf = String::new();

	for (idx, (key, value)) in pairs.into_iter().enumerate() {
		if idx > 0 {
			buf.push('&');
		}

		quote_into(&mut buf, key.as_ref());
		buf.push('=');
		quote_into(&mut buf, value.as_ref());
	}

	buf
}

fn quote_into(buf: &mut String, bytes: &[u8]) {
	// `byte_serialize` leaves `*` literal; it is reserved here.
	for chunk in form_urlencoded::byte_serialize(bytes) {
		if chunk.contains('*') {
			buf.push_str(&chunk.replace('*', "%2A"));
		} else {
			buf.push_str(chunk);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn base64url_uses_url_alphabet_without_padding() {
		assert_eq!(base64url_encode([0xfbu8, 0xff]), "-_8");
		assert_eq!(base64url_encode(b""), "");
		assert_eq!(base64url_encode(b"a"), "YQ");
		assert!(!base64url_encode(b"ab").contains('='));
	}

	#[test]
	fn base64url_round_trips_lengths_not_multiple_of_three() {
		for len in 0..8 {
			let input = (0..len).map(|i| (i * 37 + 251) as u8).collect::<Vec<_>>();
			let encoded = base64url_encode(&input);

			assert_eq!(
				base64url_decode(&encoded).expect("Encoded input should decode."),
				input,
				"length {len}"
			);
		}
	}

	#[test]
	fn base64url_decode_accepts_padded_and_rejects_non_ascii() {
		assert_eq!(base64url_decode("YQ==").expect("Padded input should decode."), b"a");
		assert!(matches!(base64url_decode("YQé"), Err(MalformedError::NonAsciiBase64)));
		assert!(matches!(base64url_decode("Y$Q"), Err(MalformedError::Base64(_))));
	}

	#[test]
	fn form_urlencode_matches_reference_layout() {
		assert_eq!(form_urlencode([("a", "1"), ("b", "x y")]), "a=1&b=x+y");
		assert_eq!(form_urlencode(Vec::<(&str, &str)>::new()), "");
	}

	#[test]
	fn form_urlencode_escapes_reserved_bytes() {
		assert_eq!(
			form_urlencode([("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer")]),
			"grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"
		);
		assert_eq!(form_urlencode([("k~*", "a/b+c")]), "k%7E%2A=a%2Fb%2Bc");
		assert_eq!(form_urlencode([(b"raw".as_slice(), [0xffu8].as_slice())]), "raw=%FF");
		assert_eq!(form_urlencode([("z", "1"), ("a", "2")]), "z=1&a=2");
	}
}
