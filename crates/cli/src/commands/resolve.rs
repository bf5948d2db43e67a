//! `pickroute resolve <venue> <location>`: Trace location resolution.

use crate::runtime::Runtime;
use pickroute_core::store::DocumentStoreExt;
use pickroute_engine::LocationRules;

pub async fn run(venue_id: String, location: String) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    let venue = runtime
        .store
        .venue(&venue_id)
        .await?
        .ok_or_else(|| format!("Venue not found: {venue_id}"))?;

    let areas = runtime.pipeline.directory().get(&venue).await?;
    let rules = LocationRules::compile(&venue, &areas);

    println!("Resolving {location:?} for {venue_id} ({} picking areas)", rules.area_count());

    let traces = rules.explain(&location);
    if traces.is_empty() {
        println!("  No candidates");
    }
    for trace in &traces {
        println!("  Candidate {}", trace.token);
        if trace.overflow {
            println!("    overflow location, skipped");
            continue;
        }
        if let Some((prefix, replacement)) = &trace.transformation {
            println!("    transformed {prefix} → {replacement}");
        }
        if let Some(renamed) = &trace.renamed {
            println!("    bin mapping → {renamed}");
        }
        if let Some(normalized) = &trace.normalized {
            println!("    looked up as {normalized}");
        }
        match &trace.matched {
            Some(area_id) => println!("    ✅ picking area {area_id}"),
            None => println!("    no match"),
        }
    }

    match traces.iter().find_map(|t| t.matched.as_deref()) {
        Some(area_id) => println!("\nResolved to {area_id}"),
        None => println!("\nUnresolved"),
    }

    Ok(())
}
