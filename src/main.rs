mod config;
mod db;
mod entity;
mod error;
mod event;
mod repo;
mod response;
mod routes;
mod service;
mod storage;

use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use db::connect_db;
use event::{DomainEvent, EventChannel, ResourceEvent};
use log::info;
use service::ResourceService;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use storage::S3BlobStore;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();

    let db = connect_db(&config)
        .await
        .map_err(|e| io::Error::other(format!("db connect failed: {}", e)))?;
    let blobs = Arc::new(S3BlobStore::from_config(&config).await);

    let sink = event::connect_sink(config.mq_url.as_deref(), config.mq_pool_size).await;
    let topics = HashMap::from([(ResourceEvent::EVENT_TYPE, config.resource_topic.clone())]);
    let (events, _dispatcher) = EventChannel::start(topics, sink, config.event_queue_capacity);

    let bucket = config.s3_bucket.clone();
    let service = web::Data::new(ResourceService::new(db, blobs, events, bucket));
    let server_port = config.server_port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(service.clone())
            .wrap(middleware::Logger::default())
            .wrap(actix_web::middleware::from_fn(routes::cors::cors_handler))
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
