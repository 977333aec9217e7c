pub mod analytics;
pub mod git_platforms;
pub mod ingestion;
pub mod insights;
pub mod metrics_aggregation;
pub mod narrative;
pub mod repo_data;
pub mod repo_sync;
