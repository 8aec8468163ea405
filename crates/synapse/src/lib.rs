pub mod agent;
pub mod dispatch;
pub mod errors;
pub mod models;
pub mod openapi;
pub mod providers;
