//! Migration System
//!
//! File discovery and parsing, the ledger, and the [`Migrator`] that applies
//! and reverts migrations.

pub mod definitions;
pub mod ledger;
pub mod manager;
pub mod parser;
pub mod rollback;
pub mod runner;
pub mod store;

pub use definitions::*;
pub use ledger::Ledger;
pub use manager::{MigrationManager, MIGRATION_TEMPLATE};
pub use parser::{parse, parse_file, ParsedMigration};
pub use runner::Migrator;
pub use store::{discover, locate, migration_version};
