use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use parlor_engine::{EngineConfig, Settings};

/// Print the effective configuration, or fail if it is invalid.
pub fn run(file: Option<&Path>, settings: Option<&Path>, json: bool) -> Result<(), String> {
    let config = super::load_config(file)?;
    let settings = super::load_settings(settings)?;

    if json {
        let doc = serde_json::json!({
            "config": config,
            "settings": settings,
        });
        let text = serde_json::to_string_pretty(&doc).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    let source = file.map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
    println!("  {} {}", "Engine config".bold(), format!("({source})").dimmed());
    println!("{}", config_table(&config));

    if !settings.groups.is_empty() {
        println!();
        println!("  {}", "Group settings".bold());
        println!("{}", settings_table(&settings));
    }
    println!();
    println!("  {}", "configuration is valid".green());
    Ok(())
}

fn config_table(config: &EngineConfig) -> Table {
    let seed = config
        .seed
        .map_or_else(|| "random".to_string(), |s| s.to_string());
    let rounds = config
        .dice_rounds
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let rows = [
        ("Sweep period", format!("{}s", config.sweep_period_secs)),
        ("Acceptance grace", format!("{}s", config.acceptance_grace_secs)),
        ("Inactivity warning", format!("{}s", config.warning_after_secs)),
        ("Inactivity timeout", format!("{}s", config.timeout_after_secs)),
        ("Proof reward", config.proof_reward.to_string()),
        ("Proof timeout penalty", config.proof_timeout_penalty.to_string()),
        ("Mute duration", format!("{}h", config.mute_hours)),
        ("Strike limit", config.strike_limit.to_string()),
        ("Dice rounds", rounds),
        ("Leaderboard size", config.leaderboard_size.to_string()),
        ("Chance plays per day", config.chance_daily_plays.to_string()),
        ("Seed", seed),
    ];

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Setting", "Value"]);
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    table
}

fn settings_table(settings: &Settings) -> Table {
    let mut groups: Vec<_> = settings.groups.iter().collect();
    groups.sort_by_key(|(id, _)| **id);

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Group", "Punishments", "Truths", "Dares"]);
    for (id, group) in groups {
        let thresholds = group
            .punishments
            .rules()
            .iter()
            .map(|r| r.threshold.to_string())
            .collect::<Vec<_>>();
        let punishments = if thresholds.is_empty() {
            "—".to_string()
        } else {
            format!("below {}", thresholds.join(", "))
        };
        table.add_row(vec![
            id.to_string(),
            punishments,
            group.truths.len().to_string(),
            group.dares.len().to_string(),
        ]);
    }
    table
}
