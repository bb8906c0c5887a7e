// src/handlers/mod.rs
pub mod auth;
pub mod github;
pub mod review;
