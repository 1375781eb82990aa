//! fedadmin core library: configuration, session codec, command registry,
//! argument validation, process supervision, and the HTTP gateway.

pub mod commands;
pub mod config;
pub mod exec;
pub mod gateway;
pub mod session;
pub mod validate;
