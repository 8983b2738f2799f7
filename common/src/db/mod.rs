pub mod core;
pub mod indices;
pub mod loader;
pub mod lut_pins;
pub mod parser;
