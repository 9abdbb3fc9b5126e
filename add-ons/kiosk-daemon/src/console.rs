//! Stdin line parsing. Lines starting with `:` are commands; anything else is an answer.

use kiosk_core::ScreenKind;

pub const HELP: &str = "\
commands:
  :face            a visitor is facing the kiosk
  :away            nobody in front of the camera
  :camera on|off   camera stream status
  :reset           back to the start screen
  :stop            stop listening
  :audio on|off    speech output on or off
  :go <screen>     button navigation (e.g. :go menu)
  :help            this text
  :quit            exit
anything else is spoken (or typed) as the visitor's answer";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Face,
    Away,
    Camera(bool),
    Reset,
    Stop,
    Audio(bool),
    Go(ScreenKind),
    Help,
    Quit,
    Answer(String),
    Empty,
    /// A command we could not parse, with the reason.
    Invalid(String),
}

fn on_off(arg: Option<&str>, command: &str) -> Result<bool, String> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(format!(":{command} expects on or off")),
    }
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return ConsoleInput::Answer(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    let parsed = match name {
        "face" => Ok(ConsoleInput::Face),
        "away" => Ok(ConsoleInput::Away),
        "camera" => on_off(arg, name).map(ConsoleInput::Camera),
        "reset" => Ok(ConsoleInput::Reset),
        "stop" => Ok(ConsoleInput::Stop),
        "audio" => on_off(arg, name).map(ConsoleInput::Audio),
        "go" => arg
            .and_then(ScreenKind::from_id)
            .map(ConsoleInput::Go)
            .ok_or_else(|| {
                let ids: Vec<&str> = ScreenKind::ALL.iter().map(|k| k.id()).collect();
                format!(":go expects one of {}", ids.join(", "))
            }),
        "help" => Ok(ConsoleInput::Help),
        "quit" | "exit" => Ok(ConsoleInput::Quit),
        other => Err(format!("unknown command :{other} (try :help)")),
    };
    parsed.unwrap_or_else(ConsoleInput::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands() {
        assert_eq!(parse_line(":face"), ConsoleInput::Face);
        assert_eq!(parse_line("  :camera off "), ConsoleInput::Camera(false));
        assert_eq!(parse_line(":audio on"), ConsoleInput::Audio(true));
        assert_eq!(parse_line(":go grade-selection"), ConsoleInput::Go(ScreenKind::GradeSelection));
        assert_eq!(parse_line(":quit"), ConsoleInput::Quit);
    }

    #[test]
    fn answers_and_mistakes() {
        assert_eq!(parse_line("dokuz"), ConsoleInput::Answer("dokuz".into()));
        assert_eq!(parse_line("   "), ConsoleInput::Empty);
        assert!(matches!(parse_line(":camera"), ConsoleInput::Invalid(_)));
        assert!(matches!(parse_line(":go nowhere"), ConsoleInput::Invalid(_)));
        assert!(matches!(parse_line(":dance"), ConsoleInput::Invalid(_)));
    }
}
