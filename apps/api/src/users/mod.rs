//! Users, candidate profiles, and staff profiles.

pub mod handlers;
pub mod queries;
