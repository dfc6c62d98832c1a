pub mod gateway;
pub mod history;
