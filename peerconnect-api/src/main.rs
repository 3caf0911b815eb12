use std::sync::Arc;
use std::time::Duration;

use socketioxide::SocketIo;

use peerconnect_api::config::AppConfig;
use peerconnect_api::events::{self, publisher::EventPublisher};
use peerconnect_api::repository::pg::PgStore;
use peerconnect_api::repository::Repositories;
use peerconnect_api::socket::{self, handlers::SocketFanout};
use peerconnect_api::{routes, AppState, StateParts};
use peerconnect_shared::clients::db::create_pool;
use peerconnect_shared::clients::rabbitmq::RabbitMQClient;
use peerconnect_shared::middleware::{init_metrics, init_tracing, JWT_SECRET_ENV};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("peerconnect-api");

    let config = AppConfig::load()?;
    let port = config.port;

    // Set JWT secret for the shared auth extractor
    std::env::set_var(JWT_SECRET_ENV, &config.jwt_secret);

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let repos = Repositories::from_store(Arc::new(PgStore::new(db.clone())));

    let events = match RabbitMQClient::connect(&config.rabbitmq_url).await {
        Ok(client) => EventPublisher::new(client),
        Err(e) => {
            tracing::warn!(error = %e, "RabbitMQ unavailable, events disabled");
            EventPublisher::disabled()
        }
    };

    let metrics_handle = init_metrics()?;

    // Socket.IO layer; io is kept for pushing chat messages from REST routes
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let state = Arc::new(AppState::new(StateParts {
        config,
        repos,
        db: Some(db),
        events,
        fanout: Arc::new(SocketFanout::new(io.clone())),
        http_client,
        metrics_handle,
    }));

    io.ns("/", {
        let state = state.clone();
        move |socket: socketioxide::extract::SocketRef| {
            let state = state.clone();
            async move {
                socket::handlers::on_connect_with_state(socket, state).await;
            }
        }
    });

    let sub_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_achievement_recompute(sub_state).await {
            tracing::error!(error = %e, "achievements.recompute subscriber failed");
        }
    });

    let app = routes::router(state).layer(sio_layer);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "peerconnect-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
