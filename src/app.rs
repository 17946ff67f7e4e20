use crate::fetch::Notices;
use crate::render::{self, RecommendationView};
use crate::tmdb::{TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
}

pub async fn run_server() -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let state = AppState { tmdb };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3152));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/recommend", get(recommend))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn index() -> Html<String> {
    Html(render::page("", &Notices::new(), &[]))
}

#[derive(Deserialize)]
pub struct RecommendParams {
    #[serde(default)]
    title: String,
}

/// One user interaction: search, recommend, then one poster lookup per
/// recommendation, strictly in list order.
async fn recommend(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Html<String> {
    let mut notices = Notices::new();
    let title = params.title.trim();
    if title.is_empty() {
        notices.warn("Enter a movie name first.");
        return Html(render::page(title, &notices, &[]));
    }

    info!("Looking up recommendations for '{}'", title);
    let Some(movie_id) = state.tmdb.find_movie_id(title, &mut notices).await else {
        return Html(render::page(title, &notices, &[]));
    };

    let movies = state.tmdb.recommendations(movie_id, &mut notices).await;
    if movies.is_empty() {
        notices.warn("No recommendations found.");
        return Html(render::page(title, &notices, &[]));
    }

    let mut results = Vec::with_capacity(movies.len());
    for movie in movies {
        let poster_url = state.tmdb.poster_url(movie.id, &mut notices).await;
        results.push(RecommendationView { movie, poster_url });
    }

    info!("Rendering {} recommendations for '{}'", results.len(), title);
    Html(render::page(title, &notices, &results))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
