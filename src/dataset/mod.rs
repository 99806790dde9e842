pub mod aligner;
pub mod alignment;
pub mod corpus;
pub mod error;
pub mod features;
