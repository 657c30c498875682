//! Classify a raw input line by its first word.

use crate::domain::Room;

/// The broad class a command falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandClass {
    Help,
    Status,
    Look,
    Movement,
    PassThrough,
    Answer,
    Hint,
    Exit,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Look,
    Move(String),
    /// The full line, forwarded verbatim.
    PassThrough(String),
    /// 0-based option index, or `None` if the argument was not a number >= 1.
    Answer(Option<usize>),
    Hint,
    Exit,
    Unknown(String),
}

impl Command {
    pub fn class(&self) -> CommandClass {
        match self {
            Command::Help => CommandClass::Help,
            Command::Status => CommandClass::Status,
            Command::Look => CommandClass::Look,
            Command::Move(_) => CommandClass::Movement,
            Command::PassThrough(_) => CommandClass::PassThrough,
            Command::Answer(_) => CommandClass::Answer,
            Command::Hint => CommandClass::Hint,
            Command::Exit => CommandClass::Exit,
            Command::Unknown(_) => CommandClass::Unknown,
        }
    }
}

impl CommandClass {
    /// Commands that still answer once the session has ended.
    pub fn available_after_session(self) -> bool {
        matches!(
            self,
            CommandClass::Help
                | CommandClass::Status
                | CommandClass::Look
                | CommandClass::Hint
                | CommandClass::Exit
        )
    }
}

/// Parse one input line.
///
/// Built-in keywords win over exit names, and exit names win over
/// pass-through programs. The first word is matched case-insensitively; a
/// pass-through line is forwarded with the program name as configured.
pub fn parse_command(line: &str, room: &Room, passthrough_programs: &[String]) -> Command {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Command::Unknown(String::new());
    };
    let keyword = first.to_lowercase();
    let rest: Vec<&str> = words.collect();

    match keyword.as_str() {
        "help" | "?" => return Command::Help,
        "status" | "stats" => return Command::Status,
        "look" | "l" => return Command::Look,
        "hint" => return Command::Hint,
        "exit" | "quit" | "q" => return Command::Exit,
        "go" | "move" | "walk" => return Command::Move(rest.join(" ").to_lowercase()),
        "answer" | "a" => {
            let choice = match rest.as_slice() {
                [number] => number.parse::<usize>().ok().and_then(|n| n.checked_sub(1)),
                _ => None,
            };
            return Command::Answer(choice);
        }
        _ => {}
    }

    if room.has_exit(line) {
        return Command::Move(line.to_lowercase());
    }
    if let Some(program) = passthrough_programs
        .iter()
        .find(|program| program.eq_ignore_ascii_case(first))
    {
        return Command::PassThrough(format!("{program}{}", &line[first.len()..]));
    }
    Command::Unknown(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new("hall", "Hall")
            .with_exit("forward", "next")
            .with_exit("secret door", "vault")
    }

    fn parse(line: &str) -> Command {
        parse_command(line, &room(), &["git".to_string()])
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(parse("HELP"), Command::Help);
        assert_eq!(parse("Status"), Command::Status);
        assert_eq!(parse("  look  "), Command::Look);
        assert_eq!(parse("Hint"), Command::Hint);
        assert_eq!(parse("QUIT"), Command::Exit);
    }

    #[test]
    fn movement_by_go_or_bare_exit_name() {
        assert_eq!(parse("go forward"), Command::Move("forward".into()));
        assert_eq!(parse("Forward"), Command::Move("forward".into()));
        assert_eq!(parse("secret door"), Command::Move("secret door".into()));
        assert_eq!(parse("go"), Command::Move(String::new()));
    }

    #[test]
    fn git_lines_pass_through_verbatim() {
        assert_eq!(
            parse(r#"git commit -m "First Commit""#),
            Command::PassThrough(r#"git commit -m "First Commit""#.into())
        );
    }

    #[test]
    fn program_name_is_forwarded_as_configured() {
        assert_eq!(parse("GIT init"), Command::PassThrough("git init".into()));
        assert_eq!(
            parse("Git commit -m \"Keep THIS\""),
            Command::PassThrough("git commit -m \"Keep THIS\"".into())
        );
    }

    #[test]
    fn only_read_only_classes_survive_the_session() {
        assert!(parse("look").class().available_after_session());
        assert!(parse("hint").class().available_after_session());
        assert!(parse("exit").class().available_after_session());
        assert!(!parse("git status").class().available_after_session());
        assert!(!parse("answer 1").class().available_after_session());
        assert!(!parse("forward").class().available_after_session());
        assert!(!parse("dance").class().available_after_session());
    }

    #[test]
    fn answers_are_one_based() {
        assert_eq!(parse("answer 1"), Command::Answer(Some(0)));
        assert_eq!(parse("answer 3"), Command::Answer(Some(2)));
        assert_eq!(parse("answer 0"), Command::Answer(None));
        assert_eq!(parse("answer b"), Command::Answer(None));
        assert_eq!(parse("answer"), Command::Answer(None));
    }

    #[test]
    fn everything_else_is_unknown() {
        assert_eq!(parse("rm -rf /"), Command::Unknown("rm -rf /".into()));
        assert_eq!(parse(""), Command::Unknown(String::new()));
    }
}
