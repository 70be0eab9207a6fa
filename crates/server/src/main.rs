//! Pollbox server entry point.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{Router, middleware};
use pollbox_api::{CookieSessionResolver, middleware::AppState, router as api_router};
use pollbox_common::Config;
use pollbox_core::{PollService, ResultsService, UserService, VoteService, seed};
use pollbox_db::repositories::{
    PollOptionRepository, PollRepository, UserRepository, VoteRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pollbox=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting pollbox server...");

    let config = Config::load().context("failed to load configuration")?;

    let db = pollbox_db::init(&config.database).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    pollbox_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let option_repo = PollOptionRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));

    // Initialize services
    let user_service = UserService::new(Arc::clone(&db), user_repo.clone());
    let poll_service = PollService::new(
        Arc::clone(&db),
        poll_repo.clone(),
        option_repo.clone(),
        vote_repo.clone(),
        config.polls.clone(),
    );
    let vote_service = VoteService::new(
        Arc::clone(&db),
        user_repo,
        poll_repo.clone(),
        option_repo.clone(),
        vote_repo.clone(),
    );
    let results_service = ResultsService::new(poll_repo, option_repo, vote_repo);

    if config.database.seed_on_empty {
        seed::seed_if_empty(&user_service, &poll_service, &vote_service).await?;
    }

    let state = AppState {
        user_service,
        poll_service,
        vote_service,
        results_service,
        sessions: Arc::new(CookieSessionResolver::new(&config.session)),
    };

    let app = Router::new()
        .merge(api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            pollbox_api::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
            .await
            .with_context(|| {
                format!(
                    "failed to bind {}:{}",
                    config.server.host, config.server.port
                )
            })?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
