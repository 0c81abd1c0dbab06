pub mod config;
pub mod core;
pub mod error;
pub mod feed;
pub mod models;
pub mod scheduler;
pub mod strategies;
#[cfg(test)]
pub mod test_helpers;
pub mod trading;
