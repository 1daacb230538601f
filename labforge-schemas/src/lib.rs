//! Shared data model for the Labforge virtual chemistry bench.

pub mod chemical;
pub mod command;
pub mod equipment;
pub mod experiment;
pub mod file_formats;
pub mod reaction;
pub mod safety;
pub mod session;
