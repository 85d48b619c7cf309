//! Resume-to-job matching: text extraction, keyword derivation, and scoring.

pub mod extract;
pub mod keywords;
pub mod scorer;
