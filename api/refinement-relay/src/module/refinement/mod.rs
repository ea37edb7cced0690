pub mod controller;
pub mod error;
pub mod route;
pub mod schema;
