//! Library management authentication service
//!
//! Issues signed-cookie JWT sessions on signup and login, gates the admin
//! librarian endpoints by role, answers token introspection for sibling
//! services, and keeps a request/response audit trail of every signup,
//! login and logout.

pub mod audit;
pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod state;
pub mod validation;

pub use state::AppState;
