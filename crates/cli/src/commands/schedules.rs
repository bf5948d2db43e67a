//! `pickroute schedules`: Show every venue's schedule trigger.

use crate::runtime::Runtime;
use pickroute_core::store::DocumentStoreExt;
use pickroute_scheduler::trigger_for;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let venues = runtime.store.venues().await?;

    println!("Schedules (UTC offset {} min)", runtime.config.scheduler.utc_offset_minutes);
    println!("==============================");

    if venues.is_empty() {
        println!("  No venues in the {} store", runtime.store.name());
        return Ok(());
    }

    for venue in &venues {
        let trigger = match trigger_for(&venue.schedule) {
            Ok(Some(trigger)) => trigger,
            Ok(None) => "-".to_string(),
            Err(e) => format!("invalid ({e})"),
        };
        println!(
            "  {:<24} {:<12} {}",
            venue.venue_id,
            venue.schedule.schedule_type.to_string(),
            trigger
        );
    }

    Ok(())
}
