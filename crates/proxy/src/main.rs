mod context;
mod gate;
mod service;
mod upstream;

use anyhow::Result;
use malblock_admin::SharedStateType as SharedState;
use malblock_classifier::Classifier;
use malblock_common::AppConfig;
use malblock_maintenance::MaintenanceScheduler;
use malblock_reputation::ReputationStore;
use pingora_core::server::Server;
use pingora_core::services::background::background_service;
use pingora_proxy::http_proxy_service;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::gate::RequestGate;
use crate::service::MalblockProxy;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/malblock.yaml".to_string());

    info!(config_path = %config_path, "starting malblock");

    let config = AppConfig::load(&config_path)?;

    let store = ReputationStore::from_config(&config.blocking, &config.store);
    let classifier = Classifier::from_config(&config.scanner);
    info!(
        include_private_ips = classifier.includes_private_ips(),
        reset_after_secs = store.policy().reset_after.as_secs(),
        min_time_secs = store.policy().min_time.as_secs(),
        "reputation policy loaded"
    );

    let scheduler = MaintenanceScheduler::from_config(
        store.clone(),
        &config.maintenance,
        config.pushgateway.as_ref(),
    )?;
    let state = malblock_admin::new_shared_state(config.clone(), store.clone())?;
    let gate = RequestGate::new(classifier, store);

    let mut server = Server::new(None)?;
    server.bootstrap();

    let mut proxy_service =
        http_proxy_service(&server.configuration, MalblockProxy::new(gate, state.clone()));
    for listen_addr in &config.server.listen {
        info!(addr = %listen_addr, "adding listener");
        proxy_service.add_tcp(listen_addr);
    }
    server.add_service(proxy_service);

    server.add_service(background_service(
        "reputation maintenance",
        MaintenanceBackgroundService { scheduler },
    ));

    if config.server.admin.enabled {
        server.add_service(background_service(
            "admin API",
            AdminBackgroundService {
                listen_addr: config.server.admin.listen.clone(),
                state,
            },
        ));
    }

    info!("malblock started");
    server.run_forever();
}

/// Runs eviction and metrics export until the server shuts down.
struct MaintenanceBackgroundService {
    scheduler: MaintenanceScheduler,
}

#[async_trait::async_trait]
impl pingora_core::services::background::BackgroundService for MaintenanceBackgroundService {
    async fn start(&self, shutdown: pingora_core::server::ShutdownWatch) {
        self.scheduler.run(shutdown).await;
    }
}

/// Background service to run the admin API alongside Pingora.
struct AdminBackgroundService {
    listen_addr: String,
    state: SharedState,
}

#[async_trait::async_trait]
impl pingora_core::services::background::BackgroundService for AdminBackgroundService {
    async fn start(&self, mut shutdown: pingora_core::server::ShutdownWatch) {
        info!(addr = %self.listen_addr, "starting admin API");

        tokio::select! {
            result = malblock_admin::run_admin_server(self.state.clone(), &self.listen_addr) => {
                if let Err(e) = result {
                    error!(error = %e, "admin API server error");
                }
            }
            _ = shutdown.changed() => {
                info!("admin API shutting down");
            }
        }
    }
}
