pub mod analysis;
pub mod catalog;
pub mod config;
pub mod effects;
pub mod error;
pub mod logger;
pub mod persistence;
pub mod properties;
pub mod resolver;
pub mod safety;
pub mod scoring;
pub mod simulation;
