// src/lib.rs

pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod response;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;
