/// Middleware module
///
/// Transport guard that turns bearer tokens into authenticated contexts.

mod jwt_guard;

pub use jwt_guard::{AuthContext, JwtGuard, RefreshContext};
