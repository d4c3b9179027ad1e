pub mod auth;
pub mod catalog;
pub mod config;
pub mod frontend;
pub mod schema;
pub mod service;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutils;
