pub mod error;
pub mod reader;
pub mod resample;
pub mod store;
