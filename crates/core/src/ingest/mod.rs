pub mod error;
pub mod finnhub;
pub mod manager;
pub mod provider;
pub mod tipranks;
