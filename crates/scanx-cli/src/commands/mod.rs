//! CLI subcommands.

pub mod bench;
pub mod validate;
