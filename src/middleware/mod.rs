/// Middleware module
///
/// Session resolution and renewal for identity-consuming routes.

mod session_middleware;

pub use session_middleware::SessionMiddleware;
