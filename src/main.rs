use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // brings ApiDoc::openapi() into scope
use utoipa_swagger_ui::SwaggerUi;

use boardfinder::config::{AppConfig, StoreBackend};
use boardfinder::openapi::ApiDoc;
use boardfinder::repo::inmem::InMemRepo;
use boardfinder::repo::Repo;
use boardfinder::routes::{config, AppState};
use boardfinder::security::SecurityHeaders;
use boardfinder::storage::{FsImageStore, ImageStore};

#[cfg(feature = "postgres-store")]
async fn postgres_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use boardfinder::repo::pg::{run_migrations, PgRepo};
    use sqlx::postgres::PgPoolOptions;

    let url = cfg.database_url.as_deref().context("DATABASE_URL must be set for the postgres backend")?;
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    if cfg.run_migrations {
        run_migrations(&pool).await.context("failed to apply migrations")?;
        info!("database migrations applied");
    }
    info!("Using Postgres repository backend");
    Ok(Arc::new(PgRepo::new(pool)))
}

#[cfg(not(feature = "postgres-store"))]
async fn postgres_repo(_cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("STORE_BACKEND=postgres requires the postgres-store feature")
}

fn cors(frontend_url: Option<&str>) -> Cors {
    let mut c = Cors::default()
        // local Vite dev server
        .allowed_origin("http://localhost:5173")
        .allowed_origin("http://127.0.0.1:5173")
        .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .supports_credentials()
        .max_age(3600);
    if let Some(front) = frontend_url {
        c = c.allowed_origin(front);
    }
    c
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    info!("Bootstrapping boardfinder server");
    info!("Frontend URL: {}", cfg.frontend_url.as_deref().unwrap_or("(not set)"));
    if cfg.require_listing_approval {
        info!("New listings require admin approval");
    }
    if cfg.bootstrap_admin_emails.is_empty() {
        warn!("BOOTSTRAP_ADMIN_EMAILS is empty; no account can register as admin");
    }

    let repo: Arc<dyn Repo> = match cfg.store_backend {
        StoreBackend::Postgres => postgres_repo(&cfg).await?,
        StoreBackend::Memory => {
            info!("Using in-memory repository backend");
            Arc::new(InMemRepo::new())
        }
    };
    let image_store: Arc<dyn ImageStore> = Arc::new(
        FsImageStore::new(cfg.upload_dir.clone()).await.context("failed to prepare upload directory")?,
    );

    let listen = cfg.listen_addr();
    let enable_hsts = cfg.enable_hsts;
    let frontend_url = cfg.frontend_url.clone();
    let state = web::Data::new(AppState::new(repo, image_store, cfg));
    let openapi = ApiDoc::openapi();
    info!("OpenAPI document generated");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::default().with_hsts(enable_hsts))
            .wrap(cors(frontend_url.as_deref()))
            .app_data(state.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(listen.clone())
    .with_context(|| format!("failed to bind {}:{}", listen.0, listen.1))?;

    info!("Listening on http://{}:{}", listen.0, listen.1);
    server.run().await?;
    Ok(())
}
