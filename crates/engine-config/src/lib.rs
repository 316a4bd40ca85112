pub mod env;
pub mod error;
pub mod settings;
pub mod sources;
