//! Database module exports.

mod models;
mod mongo;
mod quota;
mod users;

pub use mongo::Database;
pub use users::UserRepo;
