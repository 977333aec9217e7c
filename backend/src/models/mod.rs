pub mod repository;
pub mod contributor;
pub mod contributor_repo;
pub mod commit;
pub mod pull_request;
pub mod issue;
pub mod daily_metric;
pub mod insight;
