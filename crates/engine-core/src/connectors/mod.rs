pub mod destination;
pub mod memory;
pub mod ozon;
pub mod source;
pub mod wildberries;
