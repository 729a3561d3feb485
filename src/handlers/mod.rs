// src/handlers/mod.rs

pub mod auth;
pub mod dashboard;
pub mod orders;
pub mod services;
pub mod users;
