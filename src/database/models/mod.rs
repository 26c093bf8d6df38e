//! Database model exports.

pub mod user;

pub use user::UserRecord;
