/// Audio mixer state. The mixer never plays anything itself; it decides
/// which audio commands are worth emitting.
use serde::{Deserialize, Serialize};

use crate::core::command::Command;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub music_volume: f32,
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            music_volume: 0.5,
            sfx_volume: 0.7,
            muted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioMixer {
    settings: AudioSettings,
    current_track: Option<String>,
}

impl AudioMixer {
    pub fn new(settings: AudioSettings) -> Self {
        Self {
            settings: AudioSettings {
                music_volume: clamp_volume(settings.music_volume),
                sfx_volume: clamp_volume(settings.sfx_volume),
                muted: settings.muted,
            },
            current_track: None,
        }
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current_track.as_deref()
    }

    /// Start a track unless it is already the one playing.
    pub fn play_music(&mut self, track: &str) -> Option<Command> {
        if self.current_track.as_deref() == Some(track) {
            return None;
        }
        self.current_track = Some(track.to_string());
        Some(Command::PlayMusic {
            track: track.to_string(),
        })
    }

    pub fn stop_music(&mut self) -> Option<Command> {
        self.current_track.take().map(|_| Command::StopMusic)
    }

    /// Sound effects are dropped entirely while muted.
    pub fn play_sfx(&self, sfx: &str) -> Option<Command> {
        if self.settings.muted {
            return None;
        }
        Some(Command::PlaySfx {
            sfx: sfx.to_string(),
        })
    }

    pub fn set_music_volume(&mut self, volume: f32) -> Command {
        self.settings.music_volume = clamp_volume(volume);
        Command::SetMusicVolume {
            volume: self.settings.music_volume,
        }
    }

    pub fn set_sfx_volume(&mut self, volume: f32) -> Command {
        self.settings.sfx_volume = clamp_volume(volume);
        Command::SetSfxVolume {
            volume: self.settings.sfx_volume,
        }
    }

    pub fn toggle_mute(&mut self) -> Command {
        self.settings.muted = !self.settings.muted;
        Command::SetMuted {
            muted: self.settings.muted,
        }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
