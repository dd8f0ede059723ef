//! Subcommand implementations

pub mod instances;
pub mod lrp;
