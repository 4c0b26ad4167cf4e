//! SOPS integration: payload validation, decryption driving, and the
//! decrypted-value representation used by derivation.

mod driver;
mod error;
mod payload;
mod validator;

pub use driver::{Decryptor, SopsProcessDriver};
pub use error::{SopsError, ValidationError};
pub use payload::{DecryptedPayload, DecryptedValue};
pub use validator::validate;
