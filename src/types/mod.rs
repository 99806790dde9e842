pub mod sensor;
pub mod station;
