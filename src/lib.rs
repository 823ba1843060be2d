pub mod analyzers;
pub mod config;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod marking;
pub mod model;
pub mod output;
pub mod parser;
pub mod services;
pub mod stats;
