use std::time::Duration;

use ntask_engine::EngineEvent;

pub const DEFAULT_PORT: u16 = 8963;

/// Pause before `FIN` so it does not coalesce into the same TCP packet as
/// the preceding message.
pub const FIN_DELAY: Duration = Duration::from_millis(300);

/// Inbound line commands. The command word is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Start,
    Stop,
    SelectSetup(usize),
    Exit,
}

/// Parses one inbound line; unrecognized or malformed lines yield `None`
/// and are ignored by the server.
pub fn parse_line(line: &str) -> Option<RemoteCommand> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        "start" => Some(RemoteCommand::Start),
        "stop" => Some(RemoteCommand::Stop),
        "set" => rest.parse().ok().map(RemoteCommand::SelectSetup),
        "exit" => Some(RemoteCommand::Exit),
        _ => None,
    }
}

/// Outbound line for an engine event, or `None` for events that have no
/// wire representation.
pub fn wire_message(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Started => Some("STR".to_string()),
        EngineEvent::StimuliShown {
            target: Some(label),
        } => Some(format!("SET {label}")),
        EngineEvent::StimuliHidden {
            feedback: None,
            target: Some(label),
        } => Some(format!("HID {label}")),
        EngineEvent::Activated { label } => Some(format!("ACT {label}")),
        EngineEvent::Result {
            target: Some(label),
            correct,
        } => Some(format!("RES {label} {correct}")),
        EngineEvent::Stopped { .. } => Some("FIN".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntask_engine::StopReason;

    #[test]
    fn commands_parse_case_insensitively() {
        assert_eq!(parse_line("start"), Some(RemoteCommand::Start));
        assert_eq!(parse_line("START"), Some(RemoteCommand::Start));
        assert_eq!(parse_line("  Stop "), Some(RemoteCommand::Stop));
        assert_eq!(parse_line("set 2"), Some(RemoteCommand::SelectSetup(2)));
        assert_eq!(parse_line("SET  14"), Some(RemoteCommand::SelectSetup(14)));
        assert_eq!(parse_line("exit"), Some(RemoteCommand::Exit));
    }

    #[test]
    fn malformed_lines_are_ignored() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("launch"), None);
        assert_eq!(parse_line("set"), None);
        assert_eq!(parse_line("set two"), None);
        assert_eq!(parse_line("set -1"), None);
    }

    #[test]
    fn events_map_to_wire_lines() {
        assert_eq!(wire_message(&EngineEvent::Started).as_deref(), Some("STR"));
        assert_eq!(
            wire_message(&EngineEvent::StimuliShown {
                target: Some("3".into())
            })
            .as_deref(),
            Some("SET 3")
        );
        assert_eq!(
            wire_message(&EngineEvent::StimuliHidden {
                target: Some("3".into()),
                feedback: None
            })
            .as_deref(),
            Some("HID 3")
        );
        assert_eq!(
            wire_message(&EngineEvent::Result {
                target: Some("3".into()),
                correct: true
            })
            .as_deref(),
            Some("RES 3 true")
        );
        assert_eq!(
            wire_message(&EngineEvent::Stopped {
                reason: StopReason::Finished
            })
            .as_deref(),
            Some("FIN")
        );
    }

    #[test]
    fn ui_only_events_have_no_wire_form() {
        assert_eq!(
            wire_message(&EngineEvent::StimuliHidden {
                target: Some("3".into()),
                feedback: Some(true)
            }),
            None
        );
        assert_eq!(
            wire_message(&EngineEvent::NextTrial {
                trial: 0,
                target: Some("3".into())
            }),
            None
        );
        assert_eq!(
            wire_message(&EngineEvent::SetupRequested { index: 1 }),
            None
        );
    }
}
