//! `membank memory ...`
//!
//! Consult and search are timed into the performance monitor.

use crate::cli::MemoryCommands;
use crate::table::Table;
use crate::ui;
use membank_kernel::Membank;
use membank_memory::consult::ConsultationReport;
use membank_memory::knowledge::{search_entities, top_entities};
use membank_memory::patterns::Pattern;
use membank_types::error::MembankResult;

pub fn run(membank: &Membank, command: MemoryCommands) -> MembankResult<()> {
    let consultant = membank.consultant();
    let monitor = membank.monitor();
    let threshold = membank.config().memory.relevance_threshold;
    match command {
        MemoryCommands::Consult { query, json } => {
            let report = monitor.time("memory.consult", || Ok(consultant.consult(&query)))?;
            if json {
                ui::print_json(&report);
            } else {
                print_report(&report);
            }
        }
        MemoryCommands::Search { query, json } => {
            let hits = monitor.time("memory.search", || consultant.search(&query))?;
            if json {
                let rows: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|h| {
                        serde_json::json!({
                            "id": h.item.id(),
                            "document": h.item.document,
                            "title": h.item.title,
                            "score": h.score,
                        })
                    })
                    .collect();
                ui::print_json(&rows);
            } else if hits.is_empty() {
                ui::hint("No matching sections");
            } else {
                let mut table = Table::new(&["Score", "Document", "Section"]).right(0).limit(2, 60);
                for hit in &hits {
                    table.add_row(&[
                        format!("{:.3}", hit.score),
                        hit.item.document.clone(),
                        hit.item.title.clone(),
                    ]);
                }
                table.print();
            }
        }
        MemoryCommands::Extract => {
            let report = consultant.refresh_knowledge()?;
            ui::success(&format!(
                "Scanned {} documents: {} new entities, {} merged, {} new relationships, {} strengthened",
                report.documents_scanned,
                report.entities_created,
                report.entities_merged,
                report.relationships_created,
                report.relationships_strengthened
            ));
        }
        MemoryCommands::Entities { query, limit, json } => {
            let graph = consultant.knowledge().load()?;
            let mut entities = match &query {
                Some(q) => search_entities(&graph, q, threshold),
                None => top_entities(&graph, limit),
            };
            entities.truncate(limit);
            if json {
                ui::print_json(&entities);
            } else if entities.is_empty() {
                ui::hint("No entities. Build the graph with `membank memory extract`");
            } else {
                let mut table = Table::new(&["Entity", "Type", "Mentions", "Score"])
                    .right(2)
                    .right(3);
                for scored in &entities {
                    table.add_row(&[
                        scored.item.name.clone(),
                        scored.item.entity_type.to_string(),
                        scored.item.mentions.to_string(),
                        format!("{:.2}", scored.score),
                    ]);
                }
                table.print();
            }
        }
        MemoryCommands::Decide { title, body } => {
            consultant.record_decision(&title, &body)?;
            ui::success(&format!("Logged decision: {title}"));
        }
        MemoryCommands::Patterns { query, limit, json } => {
            let library = consultant.pattern_library()?;
            let mut patterns = match &query {
                Some(q) => library.match_patterns(q, threshold),
                None => library.top_patterns(limit),
            };
            patterns.truncate(limit);
            if json {
                ui::print_json(&patterns);
            } else if patterns.is_empty() {
                ui::hint("No patterns. Add one with `membank memory learn <id> <name>`");
            } else {
                let mut table = Table::new(&["ID", "Name", "Uses", "Success", "Score"])
                    .right(2)
                    .right(3)
                    .right(4)
                    .limit(1, 40);
                for scored in &patterns {
                    table.add_row(&[
                        scored.item.id.clone(),
                        scored.item.name.clone(),
                        scored.item.usage_count.to_string(),
                        format!("{:.0}%", scored.item.success_rate * 100.0),
                        format!("{:.2}", scored.score),
                    ]);
                }
                table.print();
            }
        }
        MemoryCommands::Learn {
            id,
            name,
            description,
            category,
            keywords,
            solution,
        } => {
            let mut pattern = Pattern::new(id, name);
            pattern.description = description;
            pattern.category = category;
            pattern.keywords = keywords;
            pattern.solution = solution;
            let id = pattern.id.clone();
            consultant.learn_pattern(pattern)?;
            ui::success(&format!("Saved pattern {id}"));
        }
        MemoryCommands::UsePattern { id, failed } => {
            consultant.record_pattern_usage(&id, !failed)?;
            ui::success(&format!("Recorded use of {id}"));
        }
        MemoryCommands::Consolidate { json } => {
            let report = membank.consolidation_engine().consolidate()?;
            if json {
                ui::print_json(&report);
            } else {
                ui::section("Consolidation");
                ui::kv("Merged", &report.patterns_merged.to_string());
                ui::kv("Remaining", &report.patterns_remaining.to_string());
                ui::kv("Stale cache", &report.stale_cache_entries.to_string());
                ui::kv("Took", &format!("{} ms", report.duration_ms));
                if report.stale_cache_entries > 0 {
                    ui::hint("Remove stale entries with `membank cache prune`");
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: &ConsultationReport) {
    ui::section(&format!("Consultation: {}", report.query));
    ui::kv(
        "Mode",
        &format!(
            "{}{}",
            report.mode,
            if report.cached { " (cached)" } else { "" }
        ),
    );
    ui::kv("Keywords", &report.keywords.join(", "));
    ui::kv("Took", &format!("{} ms", report.elapsed_ms));

    if !report.documents.is_empty() {
        ui::blank();
        ui::section("Relevant sections");
        for doc in &report.documents {
            ui::bullet(&format!("{} / {} ({:.2})", doc.document, doc.title, doc.score));
            if !doc.snippet.is_empty() {
                println!("      {}", doc.snippet);
            }
        }
    }
    if !report.patterns.is_empty() {
        ui::blank();
        ui::section("Patterns");
        for p in &report.patterns {
            ui::bullet(&format!("{} ({:.2}): {}", p.name, p.score, p.solution));
        }
    }
    if !report.decisions.is_empty() {
        ui::blank();
        ui::section("Decisions");
        for d in &report.decisions {
            let date = d.date.map(|d| d.to_string()).unwrap_or_else(|| "undated".to_string());
            ui::bullet(&format!("[{date}] {} ({:.2})", d.title, d.score));
        }
    }
    if !report.entities.is_empty() {
        ui::blank();
        ui::section("Entities");
        for e in &report.entities {
            ui::bullet(&format!("{} [{}] ({:.2})", e.name, e.entity_type, e.score));
        }
    }
    if !report.recommendations.is_empty() {
        ui::blank();
        ui::section("Recommendations");
        for r in &report.recommendations {
            ui::bullet(r);
        }
    }
}
