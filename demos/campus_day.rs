/// Campus Day example — plays through the bundled campus script.
///
/// A short run: meet Huanshi on the library roof, save, try another
/// route, load the save back and finish on the rooftop.
///
/// Run with: cargo run --example campus_day

use galgame_engine::core::clock::ManualClock;
use galgame_engine::core::command::Command;
use galgame_engine::core::interpreter::GalgameEngine;
use galgame_engine::core::persistence::FileStore;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let saves_dir = std::env::temp_dir().join("galgame_campus_day");
    let store = FileStore::open(&saves_dir).expect("Failed to open save directory");
    let clock = ManualClock::new(chrono::Utc::now());

    let mut engine = GalgameEngine::builder()
        .script_path(Path::new("script_data/campus/script.json"))
        .config_path(Path::new("script_data/campus/engine.ron"))
        .store(store)
        .clock(clock.clone())
        .seed(2026)
        .build()
        .expect("Failed to build engine");

    println!("=== Campus Day ===\n");

    // --- Morning: opening scene up to the first choice ---
    show(&engine.start_game());
    show(&engine.skip_to_next_choice());
    show(&engine.advance_one_step());

    // --- Lunch on the library roof ---
    show(&engine.resolve_choice(0));
    show(&engine.advance_one_step());
    engine.save(1).expect("Failed to save");
    println!("   (saved to slot 1 at {})", saves_dir.display());
    show(&engine.advance_one_step());
    show(&engine.advance_one_step());

    // --- Change of heart: head back down ---
    show(&engine.resolve_choice(1));
    println!("   huanshi affection after leaving: {}", engine.state().affection("huanshi"));

    // --- Load the save and stay this time ---
    clock.advance(chrono::Duration::minutes(2));
    show(&engine.load(1).expect("Failed to load"));
    show(&engine.advance_one_step());
    show(&engine.advance_one_step());
    show(&engine.resolve_choice(0));
    show(&engine.advance_one_step());

    println!("\n=== Progress ===");
    for (character, value) in engine.state().affection_table() {
        println!(
            "  {:<12} {:>3} ({})",
            character,
            value,
            engine.state().affection_level(character.as_str()).label()
        );
    }
    println!("  choices made: {}", engine.state().choices_made);
    println!("  achievements: {:?}", engine.state().unlocked_achievements);
}

fn show(commands: &[Command]) {
    for command in commands {
        match command {
            Command::ShowBackground { background } => println!("\n~~ {background} ~~"),
            Command::ShowCharacter {
                character_id,
                position,
                expression,
                ..
            } => println!("   [{character_id} at {position}, {expression}]"),
            Command::ShowDialogue {
                speaker_name, text, ..
            } if speaker_name.is_empty() => println!("{text}"),
            Command::ShowDialogue {
                speaker_name, text, ..
            } => println!("{speaker_name}: {text}"),
            Command::ShowChoices { prompt, options } => {
                println!("\n{prompt}");
                for (i, option) in options.iter().enumerate() {
                    println!("  {}. {option}", i + 1);
                }
            }
            Command::ShowEnding { text } => println!("\n*** {text} ***"),
            Command::ShowAchievementNotice { icon, name, .. } => {
                println!("   {icon} Achievement unlocked: {name}")
            }
            Command::ShowAffection { character_id, value } => {
                println!("   ({character_id}: {value})")
            }
            Command::ReturnToMenu => println!("\n-- menu --"),
            _ => {}
        }
    }
}
