//! Signing capability consumed by the assertion builder.
//!
//! [`Signer`] is the only seam between this crate and key material. [`RsaSigner`] is the bundled
//! RS256 implementation; hardware-backed or remote signers plug in by implementing the trait.

pub mod rsa;

pub use rsa::RsaSigner;

// self
use crate::{_prelude::*, error::SigningError};

/// Produces signatures over arbitrary bytes and names the key that made them.
///
/// Implementations may be non-deterministic (randomized padding schemes); callers must not
/// assume two signatures over the same input are equal.
pub trait Signer
where
	Self: Send + Sync,
{
	/// Identifier of the signing key, written into the `kid` header when present.
	fn key_id(&self) -> Option<&str>;

	/// Signs `message` and returns the raw signature bytes.
	fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError>;
}
impl<S> Signer for Arc<S>
where
	S: ?Sized + Signer,
{
	fn key_id(&self) -> Option<&str> {
		(**self).key_id()
	}

	fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
		(**self).sign(message)
	}
}
