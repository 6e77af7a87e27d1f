use anyhow::Result;
use netpulse::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    // The monitor never starts without its store.
    let store = Arc::new(
        daily_store::DailyStore::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
        )
        .await
        .map_err(|e| anyhow::anyhow!("daily store: {}", e))?,
    );
    store
        .init()
        .await
        .map_err(|e| anyhow::anyhow!("daily store init: {}", e))?;

    let (hub, hub_handle) = hub::Hub::spawn(hub::HubConfig {
        subscriber_buffer: app_config.publishing.subscriber_buffer,
        queue_capacity: app_config.publishing.hub_queue_capacity,
    });

    let source = Arc::new(counter_source::SysinfoCounterSource::new());
    let interface = source
        .resolve_interface(app_config.monitoring.interface.as_deref())
        .ok_or_else(|| anyhow::anyhow!("no network interface to monitor; set monitoring.interface"))?;
    tracing::info!(interface = %interface, "Monitoring interface");

    let monitor = Arc::new(monitor::Monitor::new(
        source,
        store.clone(),
        hub,
        monitor::MonitorConfig::from_app(&app_config, interface),
    ));

    let (shutdown_tx, shutdown_rx) = monitor::worker::shutdown_channel();
    let sampler_handle = monitor::worker::spawn_sampler(
        monitor.clone(),
        monitor::worker::SamplerConfig {
            sample_interval: app_config.monitoring.sample_interval(),
            stats_log_interval: std::time::Duration::from_secs(
                app_config.monitoring.stats_log_interval_secs,
            ),
        },
        shutdown_rx.clone(),
    );
    let persister_handle = monitor::worker::spawn_persister(
        monitor.clone(),
        monitor::worker::PersisterConfig {
            persist_interval: app_config.monitoring.persist_interval(),
        },
        shutdown_rx,
    );
    let _retention_handle = retention_worker::spawn(
        store.clone(),
        retention_worker::RetentionWorkerConfig {
            retention_days: app_config.database.retention_days,
            prune_schedule: app_config.database.prune_schedule.clone(),
            prune_interval_secs: app_config.database.prune_interval_secs,
        },
    );

    let app = routes::app(monitor.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            let _ = sampler_handle.await;
            let _ = persister_handle.await;
            drop(monitor);
            hub_handle.abort();
            store.close().await;
        }
    }

    Ok(())
}
