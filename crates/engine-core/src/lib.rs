pub mod chunk;
pub mod connectors;
pub mod error;
pub mod paginate;
pub mod rate_limit;
pub mod report;
pub mod retry;
