//! Session export schema checks
//!
//! The same column and version checks back two error-handling policies:
//! [`ensure_window_schema`] fails fast for the dataset builder, while
//! [`SessionValidator`] accumulates every finding as an issue string.

mod checks;
mod validator;

pub use checks::*;
pub use validator::*;
