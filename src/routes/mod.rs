/// Router Module Index
///
/// Routes are split by access level so the authentication layer is applied to a
/// whole module at once rather than handler by handler.

/// Routes open to anonymous clients: health, registration, login.
pub mod public;

/// Routes behind the bearer-token guard: the caller's posts.
pub mod authenticated;
