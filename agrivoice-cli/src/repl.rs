use std::path::PathBuf;

/// One line typed at the `call` prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Upload(PathBuf),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "commands: start | stop | upload <image path> | status | help | quit";

pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "upload" => {
            // Paths with spaces may be quoted.
            let path = rest.trim_matches('"');
            if path.is_empty() {
                return Err("usage: upload <image path>".into());
            }
            Command::Upload(PathBuf::from(path))
        }
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(cmd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_line(" start ").unwrap(), Some(Command::Start));
        assert_eq!(parse_line("STOP").unwrap(), Some(Command::Stop));
        assert_eq!(parse_line("exit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_line("").unwrap(), None);
    }

    #[test]
    fn upload_keeps_spaces_in_path() {
        assert_eq!(
            parse_line(r#"upload "photos/tomato leaf.jpg""#).unwrap(),
            Some(Command::Upload(PathBuf::from("photos/tomato leaf.jpg")))
        );
        assert!(parse_line("upload").is_err());
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(parse_line("dance").unwrap_err(), "unknown command: dance");
    }
}
