pub mod adapter;
pub mod aggregator;
pub mod divergence;
pub mod heat;
pub mod kelly;
pub mod mtf;
pub mod sizing;
pub mod threshold;
pub mod validator;
