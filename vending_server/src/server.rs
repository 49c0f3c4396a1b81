use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use log::*;
use vending_engine::{
    events::EventProducers,
    traits::VendingDatabase,
    EventRouter,
    Reconciler,
    SessionStore,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    machine_link::create_confirmation_handlers,
    routes::{
        health,
        CancelSessionRoute,
        CreateSessionRoute,
        MachineEventRoute,
        ProcessPaymentRoute,
        ProductInfoRoute,
        ProductsRoute,
        ReportsRoute,
        SalesRoute,
        SessionStatusRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let reconciler = Reconciler::new(db, SessionStore::new(config.session_config()));
    let handlers = create_confirmation_handlers(config.event_buffer);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _worker = start_expiry_worker(reconciler.clone(), config.sweep_interval);
    info!(
        "💻️ Sessions last {}s. Expiry sweep every {}s",
        config.session_ttl.num_seconds(),
        config.sweep_interval.num_seconds()
    );
    let srv = create_server_instance(config, reconciler, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Builds the HTTP server. Every worker shares the same session store and confirmation channel.
pub fn create_server_instance(
    config: ServerConfig,
    reconciler: Reconciler<SqliteDatabase>,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let router = EventRouter::new(reconciler.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vms::access_log"))
            .app_data(web::Data::new(reconciler.clone()))
            .app_data(web::Data::new(router))
            .configure(configure_routes::<SqliteDatabase>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every route. The handlers expect a `Reconciler<B>` and an `EventRouter<B>` in the app data.
pub fn configure_routes<B: VendingDatabase + 'static>(cfg: &mut ServiceConfig) {
    let api_scope = web::scope("/api")
        .service(CreateSessionRoute::<B>::new())
        .service(ProcessPaymentRoute::<B>::new())
        .service(CancelSessionRoute::<B>::new())
        .service(SessionStatusRoute::<B>::new())
        .service(ProductInfoRoute::<B>::new());
    cfg.service(health)
        .service(api_scope)
        .service(ProductsRoute::<B>::new())
        .service(SalesRoute::<B>::new())
        .service(ReportsRoute::<B>::new())
        .service(MachineEventRoute::<B>::new());
}
