//! Subcommand implementations.

pub mod inspect;
pub mod table;
pub mod validate;
