pub mod crypto;
pub mod error;
pub mod serde_helpers;

pub use crypto::{generate_x25519_keypair, X25519KeyPair};
pub use error::{Result, XuiError};
