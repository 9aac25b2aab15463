//! Secure User API: user registration service with salted,
//! self-describing password credentials.

pub mod auth;
pub mod cli;
pub mod config;
pub mod gateway;
