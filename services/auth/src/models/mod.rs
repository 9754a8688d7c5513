//! Authentication service models

pub mod log;
pub mod role;
pub mod user;

// Re-export for convenience
pub use log::{AuditAction, Identity, LogEntry, NOT_AVAILABLE, NewLogEntry};
pub use role::{Role, UnknownRole};
pub use user::{LoginCredentials, NewUser, UpdateUser, User, UserParams, UserSummary};
