pub mod builder;
pub mod engine;
pub mod pour;
pub mod state;
