/// Script Linter — checks a galgame script for broken references and
/// scenes that end without an ending or transition.
///
/// Usage: script_linter <script.json> [--config <engine.ron>]

use galgame_engine::core::config::EngineConfig;
use galgame_engine::schema::script::ScriptData;
use galgame_engine::schema::validate::{Severity, ValidationOptions};
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: script_linter <script.json> [--config <engine.ron>]");
        process::exit(0);
    }

    let script_path = Path::new(&args[1]);
    let mut config_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            i += 1;
            config_path = Some(args[i].clone());
        }
        i += 1;
    }

    let config = match config_path {
        Some(ref path) => match EngineConfig::load_from_ron(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config: {}", e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    // Unlike the engine, the linter does not fall back to a built-in scene.
    let script = match ScriptData::load_from_json(script_path) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("ERROR: Failed to load script '{}': {}", script_path.display(), e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} scenes, {} characters, {} achievements",
        script.scenes.len(),
        script.characters.len(),
        script.achievement_catalog.len()
    );

    let issues = script.validate(&ValidationOptions {
        opening_scene: config.opening_scene.as_str(),
        free_speakers: &config.free_speakers,
    });

    println!("\n=== Script Lint Report ===\n");

    if issues.is_empty() {
        println!("All checks passed!");
    }

    for issue in &issues {
        println!("{}", issue);
    }

    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    let reachable = script.reachable_scenes(config.opening_scene.as_str()).len();
    println!(
        "\nSummary: {} errors, {} warnings, {}/{} scenes reachable",
        errors,
        issues.len() - errors,
        reachable,
        script.scenes.len()
    );

    if errors == 0 {
        process::exit(0);
    } else {
        process::exit(1);
    }
}
