pub mod booking;
pub mod incidents;
pub mod store;
