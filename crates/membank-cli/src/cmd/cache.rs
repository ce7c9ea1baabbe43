//! `membank cache ...`

use crate::cli::CacheCommands;
use crate::table::Table;
use crate::ui;
use membank_kernel::Membank;
use membank_types::error::MembankResult;

pub fn run(membank: &Membank, command: CacheCommands) -> MembankResult<()> {
    let caches = membank.caches();
    match command {
        CacheCommands::Stats { json } => {
            let mut rows = Vec::with_capacity(caches.len());
            for cache in &caches {
                rows.push((cache.collection().to_string(), cache.stats()?));
            }
            if json {
                let value: serde_json::Map<String, serde_json::Value> = rows
                    .iter()
                    .map(|(name, stats)| {
                        (
                            name.clone(),
                            serde_json::to_value(stats).unwrap_or_default(),
                        )
                    })
                    .collect();
                ui::print_json(&value);
                return Ok(());
            }
            let ttl = membank.config().cache.ttl_secs;
            ui::kv("TTL", &format!("{ttl} s"));
            let mut table = Table::new(&["Cache", "Fresh", "Stale", "Invalid"])
                .right(1)
                .right(2)
                .right(3);
            for (name, stats) in &rows {
                table.add_row(&[
                    name.clone(),
                    stats.fresh.to_string(),
                    stats.stale.to_string(),
                    stats.invalid.to_string(),
                ]);
            }
            table.print();
            if rows.iter().any(|(_, s)| s.stale > 0) {
                ui::hint("Remove stale entries with `membank cache prune`");
            }
        }
        CacheCommands::Prune => {
            let mut removed = 0;
            for cache in &caches {
                let n = cache.prune_expired()?;
                if n > 0 {
                    ui::bullet(&format!("{}: {n}", cache.collection()));
                }
                removed += n;
            }
            ui::success(&format!("Removed {removed} expired entries"));
        }
    }
    Ok(())
}
