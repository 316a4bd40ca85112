pub mod consumer;
pub mod error;
pub mod retry;
pub mod transform;
