pub mod idw;
