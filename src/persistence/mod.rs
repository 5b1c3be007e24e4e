pub mod document;
pub mod persist;
pub mod settings;
