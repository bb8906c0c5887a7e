// src/services/mod.rs
pub mod context_tools;
pub mod repo_context;
pub mod review;
pub mod review_store;
