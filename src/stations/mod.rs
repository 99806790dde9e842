pub mod error;
pub mod mesh;
pub mod registry;
pub mod selector;
