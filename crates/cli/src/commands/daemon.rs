//! `pickroute daemon`: Scheduler, dispatcher and gateway.

use crate::runtime::Runtime;
use pickroute_gateway::GatewayState;
use pickroute_scheduler::{Scheduler, spawn_dispatcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let config = &runtime.config;

    println!("pickroute daemon: Starting");
    println!("   Store:     {}", runtime.store.name());
    println!(
        "   Scheduler: {}",
        if config.scheduler.enabled { "enabled" } else { "disabled" }
    );
    println!(
        "   Gateway:   {}",
        if config.gateway.enabled {
            format!("{}:{}", config.gateway.host, config.gateway.port)
        } else {
            "disabled".to_string()
        }
    );
    if config.sync.dry_run {
        println!("   Dry run:   write-backs are logged, not sent");
    }

    let scheduler = Arc::new(Scheduler::new(
        config.scheduler.utc_offset_minutes,
        Duration::from_secs(config.scheduler.tick_secs),
    )?);

    let active = scheduler.reload(runtime.store.as_ref()).await?;
    info!(active_jobs = active, "Schedules loaded");

    let scheduler_handle = if config.scheduler.enabled {
        let (rx, handle) = scheduler.start();
        spawn_dispatcher(rx, runtime.pipeline.clone());
        info!("Scheduler started");
        Some(handle)
    } else {
        None
    };

    if config.gateway.enabled {
        let state = Arc::new(GatewayState {
            pipeline: runtime.pipeline.clone(),
            scheduler: scheduler.clone(),
        });
        // Blocks until the server stops
        pickroute_gateway::start(&config.gateway, state)
            .await
            .map_err(|e| e.to_string())?;
    } else if let Some(handle) = scheduler_handle {
        handle.await?;
    } else {
        println!("Nothing to run: scheduler and gateway are both disabled");
    }

    Ok(())
}
