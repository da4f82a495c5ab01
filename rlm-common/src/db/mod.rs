//! SQLite persistence for contracts, ledgers and schedules

pub mod init;
pub mod migrations;
pub mod store;

pub use init::{create_tables, init_database, open_in_memory};
pub use migrations::run_migrations;
pub use store::SqliteStore;
