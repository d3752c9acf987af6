//! Check-account command - run codes through the ledger's account rules

use anyhow::Result;
use colored::Colorize;
use reimburse_core::services::expander::normalize_account_code;
use serde_json::json;

use crate::output;

pub fn run(codes: &[String], json: bool) -> Result<()> {
    let results: Vec<(&str, Option<String>)> = codes
        .iter()
        .map(|code| (code.as_str(), normalize_account_code(code)))
        .collect();

    if json {
        let items: Vec<_> = results
            .iter()
            .map(|(raw, normalized)| {
                json!({
                    "input": raw,
                    "valid": normalized.is_some(),
                    "normalized": normalized,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Input", "Result", "Normalized"]);
    for (raw, normalized) in &results {
        let verdict = if normalized.is_some() {
            "ok".green().to_string()
        } else {
            "review".red().to_string()
        };
        table.add_row(vec![
            raw.to_string(),
            verdict,
            normalized.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    if results.iter().any(|(_, n)| n.is_none()) {
        std::process::exit(1);
    }
    Ok(())
}
