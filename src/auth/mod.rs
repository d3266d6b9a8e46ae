/// Authentication module
///
/// Secret hashing, JWT issuance/verification and the session rotation
/// orchestrator built on top of them.

mod claims;
mod jwt;
mod password;
mod service;

pub use claims::Claims;
pub use jwt::{TokenIssuer, TokenPurpose, TokenVerifier, Tokens};
pub use password::{PasswordHasher, MAX_BCRYPT_COST, MAX_SECRET_LENGTH, MIN_BCRYPT_COST};
pub use service::AuthService;
