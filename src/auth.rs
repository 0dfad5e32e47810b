//! Identity-domain identifiers, redacted secrets, and the session signature.

pub mod id;
pub mod secret;
pub mod signature;

pub use id::*;
pub use secret::*;
pub use signature::*;
