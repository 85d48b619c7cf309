//! Candidate applications and the hiring pipeline.

pub mod handlers;
pub mod service;
pub mod status;
