use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls),
        "create" => args.first().map(|&name| Command::Create(name.to_string())),
        "read" => {
            let name = args.first()?.to_string();
            let offset = match args.get(1) {
                Some(s) => s.parse().ok()?,
                None => 0,
            };
            let len = match args.get(2) {
                Some(s) => Some(s.parse().ok()?),
                None => None,
            };
            Some(Command::Read { name, offset, len })
        }
        "write" => {
            if args.len() < 3 {
                return None;
            }
            Some(Command::Write {
                name: args[0].to_string(),
                offset: args[1].parse().ok()?,
                text: args[2..].join(" "),
            })
        }
        "stat" => args.first().map(|&name| Command::Stat(name.to_string())),
        "df" => Some(Command::Df),
        "sync" => Some(Command::Sync),
        "format" => Some(Command::Format),
        "exit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_joins_the_rest_as_text() {
        match parse_command("write notes 4090 hello   block world") {
            Some(Command::Write { name, offset, text }) => {
                assert_eq!(name, "notes");
                assert_eq!(offset, 4090);
                assert_eq!(text, "hello block world");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_command("write notes hello").is_none());
    }

    #[test]
    fn read_defaults() {
        assert!(matches!(
            parse_command("read a"),
            Some(Command::Read { offset: 0, len: None, .. })
        ));
        assert!(matches!(
            parse_command("read a 10 20"),
            Some(Command::Read { offset: 10, len: Some(20), .. })
        ));
        assert!(parse_command("read a x").is_none());
        assert!(parse_command("read").is_none());
    }

    #[test]
    fn unknown_and_empty() {
        assert!(parse_command("   ").is_none());
        assert!(parse_command("mkdir d").is_none());
        assert!(matches!(parse_command("df"), Some(Command::Df)));
    }
}
