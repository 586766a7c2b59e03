pub mod analyzer;
pub mod factory;
pub mod launcher;
