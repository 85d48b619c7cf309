use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::mailer::Mailer;
use crate::matching::scorer::MatchScorer;
use crate::notifications::Notifier;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub mailer: Mailer,
    /// Persists notifications and fans them out to SSE subscribers and Redis.
    pub notifier: Notifier,
    pub config: Config,
    /// Pluggable resume-to-job scorer. Default: KeywordMatchScorer.
    pub match_scorer: Arc<dyn MatchScorer>,
}
