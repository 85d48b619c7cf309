//! Interview scheduling, calendar conflicts, and feedback.

pub mod handlers;
pub mod schedule;
