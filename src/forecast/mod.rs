pub mod error;
pub mod forecaster;
pub mod geocoder;
pub mod model;
pub mod outlook;
pub mod resolver;
