pub mod decoder;
pub mod frame;
