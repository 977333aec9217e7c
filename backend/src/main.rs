mod errors;
mod handlers;
mod models;
mod services;
mod utils;

#[cfg(test)]
mod test_support;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use services::analytics::AnalyticsService;
use services::git_platforms::{GitHubClient, SourceClient, SourcePlatform};
use services::insights::InsightService;
use services::narrative::{ChatCompletionsClient, NarrativeGenerator};
use services::repo_sync::RepoSyncService;
use utils::{config::Config, db, http_client::create_http_client};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file FIRST before anything else
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=================================================");
    println!("🚀 repo-pulse Backend Server");
    println!("=================================================");

    let config = Config::from_env().context("Failed to load configuration")?;
    let host = config.host.clone();
    let port = config.port;

    println!("📝 Configuration loaded:");
    println!(
        "   - Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );
    println!("   - Host: {}", host);
    println!("   - Port: {}", port);
    println!("   - GitHub API: {}", config.github_api_url);
    println!(
        "   - GitHub token: {}",
        if config.github_token.is_some() { "SET" } else { "NOT SET (60 req/h limit)" }
    );
    println!("   - Sync concurrency: {}", config.sync_concurrency);
    println!(
        "   - Narrative model: {} ({})",
        config.narrative.model,
        if config.narrative.api_key.is_some() { "key set" } else { "no key, fallbacks only" }
    );

    print!("🔌 Connecting to database... ");
    let db = db::establish_connection(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::create_schema(&db)
        .await
        .context("Failed to create database schema")?;
    println!("✅ Connected!");

    log::info!("Database connection established");

    let source_http = create_http_client(Duration::from_secs(config.http_timeout_secs))
        .context("Failed to build GitHub HTTP client")?;
    let narrative_http = create_http_client(Duration::from_secs(config.narrative.timeout_secs))
        .context("Failed to build narrative HTTP client")?;

    let platform: Arc<dyn SourcePlatform> = Arc::new(GitHubClient::new(SourceClient::new(
        source_http,
        config.github_api_url.clone(),
        config.github_token.clone(),
    )));
    let generator: Arc<dyn NarrativeGenerator> =
        Arc::new(ChatCompletionsClient::new(narrative_http, &config.narrative));

    let sync = web::Data::new(RepoSyncService::new(
        db.clone(),
        platform,
        config.sync_concurrency,
    ));
    let analytics = web::Data::new(AnalyticsService::new(db.clone(), generator.clone()));
    let insights = web::Data::new(InsightService::new(db.clone(), generator));
    let db = web::Data::new(db);

    println!("🌐 Starting HTTP server at http://{}:{}", host, port);
    println!("📍 Available endpoints:");
    println!("   - POST http://{}:{}/api/sync", host, port);
    println!("   - GET  http://{}:{}/api/repos", host, port);
    println!("   - GET  http://{}:{}/api/repos/{{id}}", host, port);
    println!("   - GET  http://{}:{}/api/repos/{{id}}/analytics", host, port);
    println!("   - GET  http://{}:{}/api/repos/{{id}}/metrics", host, port);
    println!("   - GET  http://{}:{}/api/repos/{{id}}/prs", host, port);
    println!("   - GET  http://{}:{}/api/repos/{{id}}/prs/{{number}}", host, port);
    println!("   - POST http://{}:{}/api/repos/{{id}}/prs/{{number}}/summarize", host, port);
    println!("   - GET  http://{}:{}/api/repos/{{id}}/issues", host, port);
    println!("=================================================");

    log::info!("Server started at http://{}:{}", host, port);

    let frontend_url = config.frontend_url.clone();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .app_data(db.clone())
            .app_data(sync.clone())
            .app_data(analytics.clone())
            .app_data(insights.clone())
            .wrap(Logger::default())
            .wrap(cors) // CORS must be wrapped AFTER Logger to ensure headers are added to all responses
            .service(
                web::scope("/api")
                    .route("/sync", web::post().to(handlers::sync::sync_repository))
                    .route("/repos", web::get().to(handlers::repos::list_repositories))
                    .route("/repos/{id}", web::get().to(handlers::repos::get_overview))
                    .route(
                        "/repos/{id}/analytics",
                        web::get().to(handlers::repos::get_analytics),
                    )
                    .route(
                        "/repos/{id}/metrics",
                        web::get().to(handlers::repos::get_metrics),
                    )
                    .route(
                        "/repos/{id}/prs",
                        web::get().to(handlers::pull_requests::list_pull_requests),
                    )
                    .route(
                        "/repos/{id}/prs/{number}",
                        web::get().to(handlers::pull_requests::get_pull_request),
                    )
                    .route(
                        "/repos/{id}/prs/{number}/summarize",
                        web::post().to(handlers::pull_requests::summarize_pull_request),
                    )
                    .route(
                        "/repos/{id}/issues",
                        web::get().to(handlers::issues::list_issues),
                    ),
            )
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}
