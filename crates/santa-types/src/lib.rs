pub mod api;
pub mod events;
pub mod models;

/// Users are identified by the integer id issued by the account service.
pub type UserId = i64;

pub type GroupId = i64;
