//! Galgame Engine — a visual-novel narrative state machine.
//!
//! Interprets a declarative scene script into a linear playthrough with
//! branching choices, per-character affection, achievements and save
//! slots. Rendering, audio and effects stay with the host, which receives
//! them as commands.

pub mod core;
pub mod schema;
