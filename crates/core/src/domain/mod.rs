pub mod expectation;
pub mod stock;
