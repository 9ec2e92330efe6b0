//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::DbAdapter, gemini_llm::GeminiGenerationAdapter, openai_llm::OpenAiGenerationAdapter,
    },
    config::{Config, LlmProvider},
    error::ApiError,
    web::{rest::ApiDoc, routes, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_notes_core::ports::TextGenerationService;
use study_notes_core::{PipelineSettings, RetryPolicy, StudyMaterialGenerator};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the adapter for whichever provider the configuration selects.
fn generation_service(config: &Config) -> Result<Arc<dyn TextGenerationService>, ApiError> {
    match config.llm_provider {
        LlmProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
            let adapter = GeminiGenerationAdapter::new(
                &config.gemini_api_base,
                api_key,
                config.gemini_model.clone(),
                config.generation_timeout,
            )?;
            info!("Using Gemini model {}", config.gemini_model);
            Ok(Arc::new(adapter))
        }
        LlmProvider::OpenAi => {
            let api_key = config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
            let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
            info!("Using OpenAI model {}", config.openai_model);
            Ok(Arc::new(OpenAiGenerationAdapter::new(
                client,
                config.openai_model.clone(),
            )))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Generation Pipeline ---
    let settings = PipelineSettings {
        retry: RetryPolicy {
            max_attempts: config.generation_max_attempts,
            ..RetryPolicy::default()
        },
        call_timeout: config.generation_timeout,
    };
    let generator = Arc::new(StudyMaterialGenerator::new(
        generation_service(&config)?,
        settings,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        repository: db_adapter,
        generator,
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-user-id")]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(routes(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
