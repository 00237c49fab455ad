pub mod analysis;
pub mod config;
pub mod deviation;
pub mod error;
pub mod export;
pub mod filter;
pub mod forecast;
pub mod indicators;
pub mod pipeline;
pub mod policy;
pub mod records;
pub mod synthetic;
pub mod types;
