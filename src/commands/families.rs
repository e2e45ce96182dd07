//! Families command implementation.
//!
//! Lists the entity families and the exporter metrics that feed them.

use herakles_windows_collector::schema::{schemas_for_family, Aggregation};
use herakles_windows_collector::Family;

/// Lists entity families, optionally with the key layout of every metric.
pub fn command_families(verbose: bool, family: Option<String>) -> anyhow::Result<()> {
    println!("📊 Herakles Windows Collector - Entity Families");
    println!("================================================");

    let selected: Vec<Family> = match family {
        Some(name) => vec![name.parse()?],
        None => Family::ALL.to_vec(),
    };

    for family in selected {
        let schemas: Vec<_> = schemas_for_family(family).collect();
        println!("\n🏷️  {} ({} metrics)", family, schemas.len());
        println!("{}", "─".repeat(50));

        if family == Family::Collection {
            println!("   metric groups collected (cpu, logical_disk, mssql, ...)");
            continue;
        }

        for schema in schemas {
            if !verbose {
                println!("   • {}", schema.metric);
                continue;
            }

            let mut layout = vec![schema.prefix.to_string()];
            layout.push(format!("<{}>", schema.entity_labels.join(">_<")));
            if !schema.suffix.is_empty() {
                layout.push(schema.suffix.to_string());
            }
            if let Some(dimension) = schema.dimension {
                layout.push(format!("<{}>", dimension));
            }

            let mut notes = Vec::new();
            if schema.multiplier != 1 {
                notes.push(format!("x{}", schema.multiplier));
            }
            if schema.aggregation == Aggregation::Sum {
                notes.push("summed".to_string());
            }

            println!("   • {}", schema.metric);
            println!("     └─ {}", layout.join("_"));
            if !notes.is_empty() {
                println!("        ({})", notes.join(", "));
            }
        }
    }

    Ok(())
}
