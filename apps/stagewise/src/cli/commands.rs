//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use stagewise::{CommandOutcome, RunReport, Scenario, Simulation, operation_catalogue};
use stagewise_core::{LifecycleError, OperationRegistry};
use std::path::Path;

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Run a scenario and print its report.
pub fn cmd_run(path: &Path, json_mode: bool) -> Result<(), LifecycleError> {
    let scenario = Scenario::load(path)?;
    let report = Simulation::new(&scenario, OperationRegistry::with_defaults())?.run()?;

    if !report.stalled.is_empty() {
        tracing::warn!(stalled = report.stalled.len(), "processes never retired");
    }

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
        return Ok(());
    }

    print_report(path, &report);
    Ok(())
}

fn print_report(path: &Path, report: &RunReport) {
    println!("Stagewise Run");
    println!("=============");
    println!("Scenario:   {:?}", path);
    println!("Final tick: {}", report.final_tick);
    println!();

    println!("Commands:");
    for command in &report.commands {
        let detail = match command.outcome {
            CommandOutcome::Done | CommandOutcome::Deferred => command
                .completed_at
                .map(|tick| format!("retired at tick {}", tick))
                .unwrap_or_default(),
            CommandOutcome::Stalled => command
                .process
                .map(|process| format!("{} still pending", process))
                .unwrap_or_default(),
            CommandOutcome::Failed => command.error.clone().unwrap_or_default(),
        };
        println!(
            "  [{:>5}] {} {} -> {:?} {}",
            command.at, command.operation, command.target, command.outcome, detail
        );
    }

    if !report.stalled.is_empty() {
        println!();
        println!("Stalled:");
        for stalled in &report.stalled {
            println!(
                "  {} {} on {} (stage {}/{}), waiting on: {}",
                stalled.snapshot.id,
                stalled.snapshot.operation,
                stalled.target,
                stalled.snapshot.stage + 1,
                stalled.snapshot.stage_count,
                stalled.waiting_on.join(", ")
            );
        }
    }

    if !report.timeline.is_empty() {
        println!();
        println!("Timeline:");
        for entry in &report.timeline {
            println!(
                "  [{:>5}] {} ({}): {} -> {}",
                entry.tick, entry.change.label, entry.change.domain, entry.change.from, entry.change.to
            );
        }
    }

    println!();
    println!("Final Status:");
    for component in &report.components {
        println!(
            "  {:<32} {}",
            component.path,
            component.status.unwrap_or("-")
        );
    }
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Check a scenario without running it.
pub fn cmd_validate(path: &Path, json_mode: bool) -> Result<(), LifecycleError> {
    let scenario = Scenario::load(path)?;
    let summary = scenario.validate(&OperationRegistry::with_defaults())?;

    if json_mode {
        let output = serde_json::json!({
            "scenario": path.to_string_lossy(),
            "valid": true,
            "summary": summary,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Scenario OK: {:?}", path);
    println!();
    println!("Components:   {}", summary.components);
    println!("Participants: {}", summary.participants);
    println!("Commands:     {}", summary.commands);
    if let Some(last) = summary.last_command_at {
        println!("Last command: tick {}", last);
    }

    Ok(())
}

// =============================================================================
// OPERATIONS COMMAND
// =============================================================================

/// List the registered operations.
pub fn cmd_operations(json_mode: bool) -> Result<(), LifecycleError> {
    let catalogue = operation_catalogue(&OperationRegistry::with_defaults())?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&catalogue).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Registered Operations");
    println!("=====================");
    for info in &catalogue {
        println!(
            "  {:<22} {:<9} {} stage(s)  {}",
            info.name,
            format!("{:?}", info.direction),
            info.stage_count,
            info.layers.join(" > ")
        );
    }

    Ok(())
}
