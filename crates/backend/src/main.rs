mod assets;
mod config;
mod graphql;
mod storage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::http::HeaderValue;
use axum::{extract::State, response::Html, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

use config::Config;
use graphql::Schema;

async fn graphql_handler(State(schema): State<Schema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn graphiql() -> Html<String> {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}

/// Build a cache-controlled static file router.
///
/// Separated so tests can exercise the caching layer with arbitrary directories.
fn cached_static_router(dir: &Path, cache_header: &'static str) -> Router {
    let layer = SetResponseHeaderLayer::overriding(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(cache_header),
    );
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(layer)
}

const CACHE_1DAY: &str = "public, max-age=86400, must-revalidate";
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Build the full application router.
fn build_app(schema: Schema, config: &Config) -> Router {
    // Static file routers are stateless; merge them before adding app state
    let static_files = Router::new()
        .nest(
            "/static",
            cached_static_router(&config.assets_dir, CACHE_1DAY),
        )
        .nest(
            "/dist",
            cached_static_router(&config.dist_dir, CACHE_IMMUTABLE),
        )
        .nest(
            "/assets",
            cached_static_router(&config.dist_dir.join("assets"), CACHE_IMMUTABLE),
        );

    let index_path = Arc::new(config.dist_dir.join("index.html"));
    let index = move || serve_index(index_path.clone());

    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/", get(index.clone()))
        .route("/view", get(index.clone()))
        .route("/story/{id}", get(index.clone()))
        .route("/hunt/{id}", get(index))
        .with_state(schema)
        .merge(static_files)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn fail(message: String) -> ! {
    tracing::error!("{message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::from_env().unwrap_or_else(|e| fail(e));

    // A missing catalog leaves map validation open rather than blocking startup
    let loaded_assets = match assets::Assets::load(&config.assets_dir) {
        Ok(assets) => assets,
        Err(e) => {
            tracing::warn!("{e}; serving an empty map catalog");
            assets::Assets::default()
        }
    };

    if let Some(parent) = config.db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            fail(format!("Failed to create database directory {}: {}", parent.display(), e));
        }
    }
    let storage = storage::Storage::open(&config.db_path).unwrap_or_else(|e| fail(e));
    match storage.count_stories() {
        Ok(stories) => tracing::info!(stories, path = %config.db_path.display(), "Opened archive database"),
        Err(e) => tracing::warn!("Could not count stories: {e}"),
    }

    let schema = graphql::build_schema(Arc::new(loaded_assets), storage);
    let app = build_app(schema, &config);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Server running at http://localhost:{}", config.port);
    tracing::info!("GraphiQL playground at http://localhost:{}/graphql", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| fail(format!("Failed to bind {}: {}", addr, e)));
    if let Err(e) = axum::serve(listener, app).await {
        fail(format!("Server error: {}", e));
    }
}

async fn serve_index(index_path: Arc<PathBuf>) -> Html<String> {
    // Try to serve the built frontend, fall back to a simple message
    match tokio::fs::read_to_string(index_path.as_path()).await {
        Ok(html) => Html(html),
        Err(_) => Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Vietnam Map Archive</title></head>
<body>
<h1>Vietnam Map Archive</h1>
<p>Frontend not built yet. Visit <a href="/graphql">GraphiQL</a> to explore the API.</p>
</body>
</html>"#
                .to_string(),
        ),
    }
}
