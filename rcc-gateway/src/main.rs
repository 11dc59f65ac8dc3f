//! Radio Control Gateway
//!
//! Registers the configured simulated radios, selects the active one and
//! logs telemetry until interrupted.

mod settings;

use std::sync::Arc;

use anyhow::Context;
use rcc_core::{Inventory, Orchestrator, TelemetryHub, TimingConfig, TracingAuditSink};
use rcc_sim::SimRadio;
use settings::Settings;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rcc=info,rcc_core=info,rcc_adapter=info,rcc_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting radio control gateway");

    let config = TimingConfig::load().context("Failed to load timing configuration")?;
    tracing::info!(
        heartbeat = ?config.heartbeat.interval,
        heartbeat_timeout = ?config.heartbeat.timeout,
        probe = ?config.probe.normal_interval,
        probe_offline_max = ?config.probe.offline.max,
        band_plan = config.band_plan.is_some(),
        "Timing configuration loaded"
    );
    let settings = Settings::load_or_init()?;

    let inventory = Arc::new(Inventory::new());
    for radio in &settings.radios {
        let adapter = Arc::new(SimRadio::from_config(radio.clone()));
        if let Err(e) = inventory
            .register_and_load(&radio.id, adapter, config.commands.get_state)
            .await
        {
            tracing::warn!(radio_id = %radio.id, error = %e, "Failed to register radio");
        }
    }
    tracing::info!(count = inventory.len(), "Radios registered");

    let hub = Arc::new(TelemetryHub::from_config(&config));
    let orchestrator = Orchestrator::new(&config)
        .with_inventory(inventory.clone())
        .with_audit(Arc::new(TracingAuditSink))
        .with_telemetry(hub.clone());

    let mut events = hub.subscribe();
    let monitor = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!(target: "telemetry", "{json}"),
                    Err(e) => tracing::warn!(error = %e, "Unserializable telemetry event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Telemetry monitor fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(radio_id) = settings.startup_radio() {
        match orchestrator.select_radio(radio_id).await {
            Ok(state) => tracing::info!(
                radio_id,
                power_dbm = state.power_dbm,
                frequency_mhz = state.frequency_mhz,
                "Active radio selected"
            ),
            Err(e) => tracing::warn!(radio_id, code = %e.code(), error = %e, "Selection failed"),
        }
    }

    if let Some(active) = inventory.active_id() {
        match orchestrator.get_state(&active).await {
            Ok(state) => tracing::info!(radio_id = %active, ?state, "Active radio state"),
            Err(e) => tracing::warn!(radio_id = %active, code = %e.code(), error = %e, "State read failed"),
        }
    } else {
        tracing::warn!("No active radio");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    hub.close();
    monitor.abort();
    Ok(())
}
