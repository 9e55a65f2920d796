pub mod achievements;
pub mod audio;
pub mod clock;
pub mod command;
pub mod config;
pub mod interpreter;
pub mod persistence;
pub mod progression;
pub mod scheduler;
