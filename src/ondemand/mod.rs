pub mod adapters;
pub mod config;
pub mod container;
pub mod generator;
pub mod render;
pub mod shell;
pub mod state;
pub mod templates;
