pub mod identity;
pub mod session;
pub mod users;
pub mod validation;
