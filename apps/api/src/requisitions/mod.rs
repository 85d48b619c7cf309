//! Job requisitions and their HOD → HR → COO approval.

pub mod handlers;
pub mod service;
