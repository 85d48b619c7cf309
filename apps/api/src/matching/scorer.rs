//! Match scoring: a pluggable, trait-based scorer comparing a resume with a job.
//!
//! Default: `KeywordMatchScorer` (weighted keyword ratio, deterministic).
//! `AppState` holds an `Arc<dyn MatchScorer>`.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::matching::keywords::{max_years_mentioned, normalize_skills, tokenize};
use crate::models::job::JobRow;

const SKILL_WEIGHT: f64 = 2.0;
const KEYWORD_WEIGHT: f64 = 1.0;
const EXPERIENCE_WEIGHT: f64 = 1.0;

/// What a scorer needs to know about a job.
#[derive(Debug, Clone, Default)]
pub struct JobProfile {
    pub required_skills: Vec<String>,
    pub keywords: Vec<String>,
    pub experience_min_years: u32,
}

impl From<&JobRow> for JobProfile {
    fn from(job: &JobRow) -> Self {
        Self {
            required_skills: job.required_skills.clone(),
            keywords: job.keywords.clone(),
            experience_min_years: job.experience_min_years.max(0) as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchReport {
    pub score: u32, // 0 – 100
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub experience_met: Option<bool>, // None when the job has no minimum
    pub scorer_backend: String,
}

/// Implement this to swap scoring backends without touching handlers.
#[async_trait]
pub trait MatchScorer: Send + Sync {
    async fn score(&self, resume_text: &str, job: &JobProfile) -> Result<MatchReport, AppError>;
}

/// Weighted keyword-overlap scorer.
///
/// - required skill: weight 2.0
/// - description keyword not already a skill: weight 1.0
/// - experience minimum (when set): weight 1.0, met by an "N years" mention ≥ minimum
///
/// score = round(matched weight / total weight × 100)
pub struct KeywordMatchScorer;

#[async_trait]
impl MatchScorer for KeywordMatchScorer {
    async fn score(&self, resume_text: &str, job: &JobProfile) -> Result<MatchReport, AppError> {
        Ok(compute_keyword_match(resume_text, job))
    }
}

struct ResumeIndex {
    tokens: HashSet<String>,
    normalized: String,
    years: Option<u32>,
}

impl ResumeIndex {
    fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        Self {
            normalized: format!(" {} ", tokens.join(" ")),
            years: max_years_mentioned(&tokens),
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Single-token terms match a token; multi-word terms match as a phrase.
    fn contains(&self, term: &str) -> bool {
        let parts = tokenize(term);
        match parts.as_slice() {
            [] => false,
            [single] => self.tokens.contains(single),
            _ => self.normalized.contains(&format!(" {} ", parts.join(" "))),
        }
    }
}

pub fn compute_keyword_match(resume_text: &str, job: &JobProfile) -> MatchReport {
    let index = ResumeIndex::new(resume_text);
    let skills = normalize_skills(&job.required_skills);
    let skill_set: HashSet<&str> = skills.iter().map(String::as_str).collect();

    let mut matched_weight = 0.0_f64;
    let mut total_weight = 0.0_f64;
    let mut matched_skills = Vec::new();
    let mut missing_skills = Vec::new();
    let mut matched_keywords = Vec::new();

    for skill in &skills {
        total_weight += SKILL_WEIGHT;
        if index.contains(skill) {
            matched_weight += SKILL_WEIGHT;
            matched_skills.push(skill.clone());
        } else {
            missing_skills.push(skill.clone());
        }
    }

    for keyword in normalize_skills(&job.keywords) {
        if skill_set.contains(keyword.as_str()) {
            continue;
        }
        total_weight += KEYWORD_WEIGHT;
        if index.contains(&keyword) {
            matched_weight += KEYWORD_WEIGHT;
            matched_keywords.push(keyword);
        }
    }

    let experience_met = if job.experience_min_years > 0 {
        total_weight += EXPERIENCE_WEIGHT;
        let met = index
            .years
            .is_some_and(|years| years >= job.experience_min_years);
        if met {
            matched_weight += EXPERIENCE_WEIGHT;
        }
        Some(met)
    } else {
        None
    };

    let score = if total_weight > 0.0 {
        ((matched_weight / total_weight) * 100.0).round().clamp(0.0, 100.0) as u32
    } else {
        0
    };

    MatchReport {
        score,
        matched_skills,
        missing_skills,
        matched_keywords,
        experience_met,
        scorer_backend: "keyword".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job(skills: &[&str], keywords: &[&str], years: u32) -> JobProfile {
        JobProfile {
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            experience_min_years: years,
        }
    }

    #[test]
    fn test_weighted_ratio() {
        let job = make_job(&["Rust", "Postgres"], &["rust", "api", "docker"], 3);
        let report = compute_keyword_match("5 years of Rust and Docker in production", &job);
        // matched: rust (2) + docker (1) + experience (1) = 4 of 7
        assert_eq!(report.score, 57);
        assert_eq!(report.matched_skills, vec!["rust"]);
        assert_eq!(report.missing_skills, vec!["postgres"]);
        assert_eq!(report.matched_keywords, vec!["docker"]);
        assert_eq!(report.experience_met, Some(true));
    }

    #[test]
    fn test_perfect_match_is_100() {
        let job = make_job(&["python"], &["django"], 0);
        let report = compute_keyword_match("Python developer building Django apps", &job);
        assert_eq!(report.score, 100);
        assert_eq!(report.experience_met, None);
    }

    #[test]
    fn test_empty_job_scores_zero() {
        let report = compute_keyword_match("anything at all", &JobProfile::default());
        assert_eq!(report.score, 0);
        assert_eq!(report.scorer_backend, "keyword");
    }

    #[test]
    fn test_multi_word_skill_needs_phrase() {
        let job = make_job(&["machine learning"], &[], 0);
        assert_eq!(
            compute_keyword_match("Applied machine-learning at scale", &job).score,
            100
        );
        assert_eq!(
            compute_keyword_match("machine shop, learning fast", &job).score,
            0
        );
    }

    #[test]
    fn test_substring_is_not_a_match() {
        let job = make_job(&["java"], &[], 0);
        assert_eq!(compute_keyword_match("JavaScript only", &job).score, 0);
    }

    #[test]
    fn test_experience_shortfall_counts_against() {
        let job = make_job(&["go"], &[], 5);
        let report = compute_keyword_match("Go engineer with 2 years experience", &job);
        assert_eq!(report.experience_met, Some(false));
        // go (2) of 3
        assert_eq!(report.score, 67);
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let scorer: Box<dyn MatchScorer> = Box::new(KeywordMatchScorer);
        let report = scorer
            .score("rust", &make_job(&["rust"], &[], 0))
            .await
            .unwrap();
        assert_eq!(report.score, 100);
    }
}
