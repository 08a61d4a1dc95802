pub mod admin;
pub mod error;
pub mod files;
pub mod handlers;
pub mod library;
pub mod middleware;
pub mod reports;
pub mod routes;
pub mod tickets;

pub use routes::create_router;
