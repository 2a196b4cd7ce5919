pub mod angle;
pub mod blob;
pub mod exclusion;
pub mod mask;
pub mod smoother;
