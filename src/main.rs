use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use dotenvy::dotenv;
use std::env;

use omamori::config::AppConfig;
use omamori::server::{api_router, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt().init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env.");

    let manager = ConnectionManager::<SqliteConnection>::new(&database_url);
    let pool = Pool::builder()
        .build(manager)
        .expect("Failed to create pool.");
    {
        let mut conn = pool.get().expect("Failed to check out a connection.");
        omamori::init_schema(&mut conn).expect("Failed to initialize the schema.");
    }

    let config = AppConfig::from_env();
    let state = AppState::new(pool, &config);
    let app = api_router(state);

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    tracing::info!("listening on http://{}", addr);
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
