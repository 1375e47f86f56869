pub mod memory;
pub mod menu;
pub mod message;
pub mod order;
