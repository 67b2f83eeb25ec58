pub mod image;
pub mod zone;
