pub mod auth;
pub mod file;
