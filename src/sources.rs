use anyhow::Result;

use crate::context::AppContext;

/// Print registered watcher types, configured watch entries, and download
/// providers for `magpie sources`.
pub fn list_sources(ctx: &AppContext) -> Result<()> {
    println!("WATCHER TYPES");
    for type_name in ctx.watchers.type_names() {
        println!("  {type_name}");
    }

    println!();
    println!("{:<20} {:<12} {:<10} IMMEDIATE", "WATCH ENTRY", "TYPE", "INTERVAL");
    if ctx.config.watch.is_empty() {
        println!("  (none configured)");
    }
    for entry in &ctx.config.watch {
        println!(
            "{:<20} {:<12} {:<10} {}",
            entry.name,
            entry.watcher_type,
            format!("{}s", entry.schedule.interval_secs),
            entry.schedule.immediate
        );
    }

    println!();
    println!("DOWNLOAD PROVIDERS");
    for provider in ctx.downloads.providers() {
        println!("  {}", provider.name());
    }

    Ok(())
}
