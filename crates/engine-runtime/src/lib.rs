pub mod error;
pub mod factory;
pub mod lookup;
pub mod orchestrator;
pub mod window;
