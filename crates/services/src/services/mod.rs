pub mod database_validator;
pub mod hierarchy;
pub mod inventory;
pub mod rack_capacity;
pub mod rack_elevation;
pub mod search;
pub mod summary;
