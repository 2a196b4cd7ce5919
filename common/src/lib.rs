pub mod angle;
pub mod color;
pub mod config;
pub mod internal;
pub mod sample;
pub mod serial;
