pub mod alerts;
pub mod config;
pub mod load;
pub mod models;
pub mod pull;
pub mod serve;
pub mod status;
