//! SQLite connection collaborator.

mod connection;

pub use connection::SqlxConnection;
