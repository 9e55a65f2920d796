/// Commands the interpreter emits and the ports that consume them.
///
/// Every engine entry point returns an ordered `Vec<Command>`. A host can
/// route them to its own port implementations with [`dispatch`], or ship
/// them elsewhere as JSON.
use serde::Serialize;

/// What a transient effect is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EffectTarget {
    TextBox,
    Character(String),
    ChoiceButton(usize),
    AffectionEntry(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    ShowBackground {
        background: String,
    },
    ShowCharacter {
        character_id: String,
        position: String,
        expression: String,
        image: String,
    },
    ClearCharacters,
    ShowDialogue {
        speaker_name: String,
        color: String,
        text: String,
    },
    ShowChoices {
        prompt: String,
        options: Vec<String>,
    },
    ShowEnding {
        text: String,
    },
    ShowAchievementNotice {
        name: String,
        icon: String,
        description: String,
        dismiss_after_ms: u64,
    },
    ShowAffection {
        character_id: String,
        value: i32,
    },
    ClearTransientUi,
    ReturnToMenu,
    PlayMusic {
        track: String,
    },
    StopMusic,
    PlaySfx {
        sfx: String,
    },
    SetMusicVolume {
        volume: f32,
    },
    SetSfxVolume {
        volume: f32,
    },
    SetMuted {
        muted: bool,
    },
    ApplyEffect {
        target: EffectTarget,
        effect: String,
        duration_ms: u64,
    },
}

impl Command {
    pub(crate) fn effect(target: EffectTarget, effect: &str, duration_ms: u64) -> Command {
        Command::ApplyEffect {
            target,
            effect: effect.to_string(),
            duration_ms,
        }
    }
}

pub trait RenderPort {
    fn show_background(&mut self, background: &str);
    fn show_character(&mut self, character_id: &str, position: &str, expression: &str, image: &str);
    fn clear_characters(&mut self);
    fn show_dialogue(&mut self, speaker_name: &str, color: &str, text: &str);
    fn show_choices(&mut self, prompt: &str, options: &[String]);
    fn show_ending(&mut self, text: &str);
    fn show_achievement_notice(&mut self, name: &str, icon: &str, description: &str, dismiss_after_ms: u64);
    fn show_affection(&mut self, character_id: &str, value: i32);
    fn clear_transient_ui(&mut self);
    fn return_to_menu(&mut self);
}

pub trait AudioPort {
    fn play_music(&mut self, track: &str);
    fn stop_music(&mut self);
    fn play_sfx(&mut self, sfx: &str);
    fn set_music_volume(&mut self, volume: f32);
    fn set_sfx_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);
}

/// Fire-and-forget visual effects; the port reverts them after the duration.
pub trait EffectPort {
    fn apply_transient_effect(&mut self, target: &EffectTarget, effect: &str, duration_ms: u64);
}

/// Route commands, in order, to the port that handles each one.
pub fn dispatch(
    commands: &[Command],
    render: &mut dyn RenderPort,
    audio: &mut dyn AudioPort,
    effects: &mut dyn EffectPort,
) {
    for command in commands {
        match command {
            Command::ShowBackground { background } => render.show_background(background),
            Command::ShowCharacter {
                character_id,
                position,
                expression,
                image,
            } => render.show_character(character_id, position, expression, image),
            Command::ClearCharacters => render.clear_characters(),
            Command::ShowDialogue {
                speaker_name,
                color,
                text,
            } => render.show_dialogue(speaker_name, color, text),
            Command::ShowChoices { prompt, options } => render.show_choices(prompt, options),
            Command::ShowEnding { text } => render.show_ending(text),
            Command::ShowAchievementNotice {
                name,
                icon,
                description,
                dismiss_after_ms,
            } => render.show_achievement_notice(name, icon, description, *dismiss_after_ms),
            Command::ShowAffection { character_id, value } => render.show_affection(character_id, *value),
            Command::ClearTransientUi => render.clear_transient_ui(),
            Command::ReturnToMenu => render.return_to_menu(),
            Command::PlayMusic { track } => audio.play_music(track),
            Command::StopMusic => audio.stop_music(),
            Command::PlaySfx { sfx } => audio.play_sfx(sfx),
            Command::SetMusicVolume { volume } => audio.set_music_volume(*volume),
            Command::SetSfxVolume { volume } => audio.set_sfx_volume(*volume),
            Command::SetMuted { muted } => audio.set_muted(*muted),
            Command::ApplyEffect {
                target,
                effect,
                duration_ms,
            } => effects.apply_transient_effect(target, effect, *duration_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl RenderPort for Log {
        fn show_background(&mut self, background: &str) {
            self.0.push(format!("bg {background}"));
        }
        fn show_character(&mut self, character_id: &str, position: &str, _: &str, _: &str) {
            self.0.push(format!("char {character_id}@{position}"));
        }
        fn clear_characters(&mut self) {
            self.0.push("clear chars".into());
        }
        fn show_dialogue(&mut self, speaker_name: &str, _: &str, text: &str) {
            self.0.push(format!("{speaker_name}: {text}"));
        }
        fn show_choices(&mut self, _: &str, options: &[String]) {
            self.0.push(format!("choices {}", options.len()));
        }
        fn show_ending(&mut self, text: &str) {
            self.0.push(format!("end {text}"));
        }
        fn show_achievement_notice(&mut self, name: &str, _: &str, _: &str, _: u64) {
            self.0.push(format!("notice {name}"));
        }
        fn show_affection(&mut self, character_id: &str, value: i32) {
            self.0.push(format!("affection {character_id}={value}"));
        }
        fn clear_transient_ui(&mut self) {
            self.0.push("clear ui".into());
        }
        fn return_to_menu(&mut self) {
            self.0.push("menu".into());
        }
    }

    impl AudioPort for Log {
        fn play_music(&mut self, track: &str) {
            self.0.push(format!("music {track}"));
        }
        fn stop_music(&mut self) {
            self.0.push("stop".into());
        }
        fn play_sfx(&mut self, sfx: &str) {
            self.0.push(format!("sfx {sfx}"));
        }
        fn set_music_volume(&mut self, _: f32) {}
        fn set_sfx_volume(&mut self, _: f32) {}
        fn set_muted(&mut self, muted: bool) {
            self.0.push(format!("muted {muted}"));
        }
    }

    #[derive(Default)]
    struct Effects(Vec<(EffectTarget, String)>);

    impl EffectPort for Effects {
        fn apply_transient_effect(&mut self, target: &EffectTarget, effect: &str, _: u64) {
            self.0.push((target.clone(), effect.to_string()));
        }
    }

    #[test]
    fn dispatch_routes_in_order() {
        let commands = vec![
            Command::ShowBackground {
                background: "canteen.jpg".into(),
            },
            Command::PlayMusic {
                track: "lunch".into(),
            },
            Command::effect(EffectTarget::TextBox, "flash", 300),
            Command::ShowDialogue {
                speaker_name: "Hana".into(),
                color: "#ff88aa".into(),
                text: "Hi!".into(),
            },
            Command::ReturnToMenu,
        ];
        let mut log = Log::default();
        let mut audio = Log::default();
        let mut effects = Effects::default();
        dispatch(&commands, &mut log, &mut audio, &mut effects);
        assert_eq!(log.0, vec!["bg canteen.jpg", "Hana: Hi!", "menu"]);
        assert_eq!(audio.0, vec!["music lunch"]);
        assert_eq!(effects.0, vec![(EffectTarget::TextBox, "flash".to_string())]);
    }

    #[test]
    fn commands_serialize_with_tag() {
        let json = serde_json::to_value(Command::effect(
            EffectTarget::ChoiceButton(2),
            "pulse",
            1400,
        ))
        .unwrap();
        assert_eq!(json["command"], "apply_effect");
        assert_eq!(json["target"]["kind"], "choice_button");
        assert_eq!(json["target"]["id"], 2);
        assert_eq!(json["duration_ms"], 1400);

        let json = serde_json::to_value(Command::ClearTransientUi).unwrap();
        assert_eq!(json, serde_json::json!({ "command": "clear_transient_ui" }));
    }
}
