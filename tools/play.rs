/// Play — terminal player for galgame scripts.
///
/// Usage: play --script <path> [--config <path>] [--saves <dir>] [--seed <n>]
///
/// Commands:
///   <enter>      — continue
///   1..n         — pick a choice option
///   skip         — skip to the next choice
///   auto         — toggle autoplay
///   save <n>     — save to slot n (1-5)
///   load <n>     — load slot n
///   slots        — list save slots
///   affection    — show affection values
///   achievements — list unlocked achievements
///   new          — start a new game
///   menu         — return to the menu
///   help         — list commands
///   quit         — exit

use galgame_engine::core::command::{dispatch, AudioPort, Command, EffectPort, EffectTarget, RenderPort};
use galgame_engine::core::interpreter::GalgameEngine;
use galgame_engine::core::persistence::FileStore;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut script_path = None;
    let mut config_path = None;
    let mut saves_dir = None;
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--script" if i + 1 < args.len() => {
                i += 1;
                script_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--saves" if i + 1 < args.len() => {
                i += 1;
                saves_dir = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(script_path) = script_path else {
        eprintln!("--script is required");
        print_usage();
        std::process::exit(1);
    };

    let mut builder = GalgameEngine::builder()
        .script_path(Path::new(&script_path))
        .seed(seed);
    if let Some(ref path) = config_path {
        builder = builder.config_path(Path::new(path));
    }
    if let Some(ref dir) = saves_dir {
        match FileStore::open(Path::new(dir)) {
            Ok(store) => builder = builder.store(store),
            Err(e) => {
                eprintln!("ERROR: cannot open save directory '{}': {}", dir, e);
                std::process::exit(1);
            }
        }
    }

    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {} scenes, {} characters",
        engine.script().scenes.len(),
        engine.script().characters.len()
    );
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let mut term = Terminal;
    let mut audio = Quiet;
    let mut effects = Quiet;
    let started = Instant::now();
    let commands = engine.start_game();
    dispatch(&commands, &mut term, &mut audio, &mut effects);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let now_ms = started.elapsed().as_millis() as u64;
        let ticked = engine.tick(now_ms);
        dispatch(&ticked, &mut term, &mut audio, &mut effects);

        let parts: Vec<&str> = line.split_whitespace().collect();
        let commands: Vec<Command> = match parts.as_slice() {
            [] => engine.advance_one_step(),
            ["quit" | "exit" | "q"] => {
                println!("Goodbye.");
                break;
            }
            ["help" | "h" | "?"] => {
                print_help();
                continue;
            }
            ["skip"] => engine.skip_to_next_choice(),
            ["auto"] => {
                let on = engine.toggle_autoplay(now_ms);
                println!("Autoplay {}", if on { "on" } else { "off" });
                continue;
            }
            ["new"] => engine.start_game(),
            ["menu"] => engine.return_to_menu(),
            ["save", slot] => {
                match slot.parse::<u8>().map(|s| engine.save(s)) {
                    Ok(Ok(())) => println!("Saved to slot {}", slot),
                    Ok(Err(e)) => println!("Save failed: {}", e),
                    Err(_) => println!("Usage: save <1-5>"),
                }
                continue;
            }
            ["load", slot] => match slot.parse::<u8>().map(|s| engine.load(s)) {
                Ok(Ok(commands)) => commands,
                Ok(Err(e)) => {
                    println!("Load failed: {}", e);
                    continue;
                }
                Err(_) => {
                    println!("Usage: load <1-5>");
                    continue;
                }
            },
            ["slots"] => {
                match engine.list_slots() {
                    Ok(slots) => {
                        for slot in slots {
                            match (&slot.scene, slot.timestamp) {
                                (Some(scene), Some(at)) => println!(
                                    "  [{}] {} line {} ({})",
                                    slot.slot,
                                    scene,
                                    slot.line_index.unwrap_or(0),
                                    at.format("%Y-%m-%d %H:%M")
                                ),
                                _ => println!("  [{}] empty", slot.slot),
                            }
                        }
                    }
                    Err(e) => println!("Storage error: {}", e),
                }
                continue;
            }
            ["affection"] => {
                for (character, value) in engine.state().affection_table() {
                    println!(
                        "  {:<16} {:>3}  ({})",
                        character,
                        value,
                        engine.state().affection_level(character.as_str()).label()
                    );
                }
                continue;
            }
            ["achievements"] => {
                let unlocked = &engine.state().unlocked_achievements;
                if unlocked.is_empty() {
                    println!("  (none yet)");
                }
                for id in unlocked {
                    let name = engine.script().achievement(id.as_str()).map(|a| a.name.as_str());
                    println!("  {} {}", id, name.unwrap_or(""));
                }
                continue;
            }
            [n] if n.parse::<usize>().is_ok() => match n.parse::<usize>() {
                Ok(n) if n >= 1 => engine.resolve_choice(n - 1),
                _ => {
                    println!("Options start at 1");
                    continue;
                }
            },
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", line.trim());
                continue;
            }
        };
        engine.finish_typewriter();
        dispatch(&commands, &mut term, &mut audio, &mut effects);
    }
}

/// Prints the story to stdout.
struct Terminal;

impl RenderPort for Terminal {
    fn show_background(&mut self, background: &str) {
        println!("\n~~ {} ~~", background);
    }

    fn show_character(&mut self, character_id: &str, position: &str, expression: &str, _image: &str) {
        println!("   [{} enters {} looking {}]", character_id, position, expression);
    }

    fn clear_characters(&mut self) {}

    fn show_dialogue(&mut self, speaker_name: &str, _color: &str, text: &str) {
        if speaker_name.is_empty() {
            println!("{}", text);
        } else {
            println!("{}: {}", speaker_name, text);
        }
    }

    fn show_choices(&mut self, prompt: &str, options: &[String]) {
        println!("\n{}", prompt);
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
    }

    fn show_ending(&mut self, text: &str) {
        println!("\n*** {} ***", text);
        println!("(type 'new' to play again)");
    }

    fn show_achievement_notice(&mut self, name: &str, icon: &str, description: &str, _dismiss_after_ms: u64) {
        println!("   {} Achievement unlocked: {} ({})", icon, name, description);
    }

    fn show_affection(&mut self, _character_id: &str, _value: i32) {}

    fn clear_transient_ui(&mut self) {}

    fn return_to_menu(&mut self) {
        println!("\n-- back at the menu (type 'new' to start) --");
    }
}

/// Audio and effects have no terminal rendition.
struct Quiet;

impl AudioPort for Quiet {
    fn play_music(&mut self, _track: &str) {}
    fn stop_music(&mut self) {}
    fn play_sfx(&mut self, _sfx: &str) {}
    fn set_music_volume(&mut self, _volume: f32) {}
    fn set_sfx_volume(&mut self, _volume: f32) {}
    fn set_muted(&mut self, _muted: bool) {}
}

impl EffectPort for Quiet {
    fn apply_transient_effect(&mut self, _target: &EffectTarget, _effect: &str, _duration_ms: u64) {}
}

fn print_usage() {
    println!("Usage: play --script <path> [--config <path>] [--saves <dir>] [--seed <n>]");
    println!();
    println!("Options:");
    println!("  --script <path>   Script JSON file");
    println!("  --config <path>   Engine config RON file");
    println!("  --saves <dir>     Directory for save files (in-memory when omitted)");
    println!("  --seed <n>        RNG seed (default: 42)");
}

fn print_help() {
    println!("Commands:");
    println!("  <enter>        Continue");
    println!("  1..n           Pick a choice option");
    println!("  skip           Skip to the next choice");
    println!("  auto           Toggle autoplay");
    println!("  save <n>       Save to slot n (1-5)");
    println!("  load <n>       Load slot n");
    println!("  slots          List save slots");
    println!("  affection      Show affection values");
    println!("  achievements   List unlocked achievements");
    println!("  new            Start a new game");
    println!("  menu           Return to the menu");
    println!("  quit           Exit");
}
