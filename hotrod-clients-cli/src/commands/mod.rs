//! CLI subcommands.

pub mod check;
pub mod clients;
pub mod common;
pub mod describe;
pub mod schemas;
