//! `pickroute sync <venue>`: Run one sync and print the report.

use crate::runtime::Runtime;
use pickroute_config::AppConfig;

pub async fn run(venue_id: String, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if dry_run {
        config.sync.dry_run = true;
    }
    let runtime = Runtime::build(config).await?;

    let report = runtime.pipeline.sync(&venue_id).await?;
    let counts = report.counts();

    println!("Sync for {}{}", report.venue_id, if report.dry_run { " (dry run)" } else { "" });
    println!("  Assigned:        {}", counts.assigned);
    println!("  Unavailable:     {}", counts.unavailable);
    println!("  Unallocated:     {}", counts.unallocated);
    println!("  Attached:        {}", counts.attached);
    println!("  Attach failures: {}", counts.attach_failures);
    println!(
        "  Took:            {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );

    if !report.unavailable.is_empty() {
        println!("\n{}", serde_json::to_string_pretty(&report.unavailable)?);
    }

    Ok(())
}
