//! Job postings created from approved requisitions.

pub mod handlers;
pub mod service;
