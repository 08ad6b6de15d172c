//! Scope sets and bearer token values carried by credentials.

pub mod scope;
pub mod token;

pub use scope::*;
pub use token::*;
