//! Statement classification.
//!
//! Every complete statement is classified once into a [`Command`]. Only a
//! handful of leading keywords are recognised; anything else goes to the
//! cluster untouched.

/// What a statement asks the shell to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `exit` or `quit`.
    Exit,
    /// Blank input or a `--` / `//` comment.
    Noop,
    /// `use <keyspace>`.
    UseKeyspace(String),
    /// `desc ...` / `describe ...`.
    Describe(DescribeTarget),
    /// `tracing on|off`.
    Tracing(TracingSwitch),
    /// Anything else, sent to the cluster as typed.
    Passthrough(String),
}

/// Object of a describe command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeTarget {
    Keyspaces,
    /// A named keyspace, or the active one.
    Keyspace(Option<String>),
    Tables,
    /// A table, optionally qualified as `keyspace.table`.
    Table(String),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingSwitch {
    On,
    Off,
    Invalid,
}

/// Strip terminators and whitespace from an identifier, and quotes from each
/// of its dotted parts.
fn identifier(word: &str) -> String {
    word.trim()
        .trim_end_matches(';')
        .split('.')
        .map(|part| part.trim().trim_matches('"'))
        .collect::<Vec<_>>()
        .join(".")
}

impl Command {
    pub fn parse(statement: &str) -> Self {
        let trimmed = statement.trim();
        let body = trimmed.trim_end_matches(';').trim();

        let mut words = body.split_whitespace();
        let keyword = words.next().map(str::to_lowercase).unwrap_or_default();

        if keyword == "exit" || keyword == "quit" {
            return Command::Exit;
        }
        if body.is_empty() || body.starts_with("--") || body.starts_with("//") {
            return Command::Noop;
        }

        match keyword.as_str() {
            "use" => {
                let rest = body[keyword.len()..].trim();
                let name = identifier(rest);
                if name.is_empty() {
                    Command::Passthrough(trimmed.to_string())
                } else {
                    Command::UseKeyspace(name)
                }
            }
            "desc" | "describe" => Command::Describe(DescribeTarget::parse(words)),
            "tracing" => {
                let arg = words.next().map(str::to_lowercase);
                let switch = match (arg.as_deref(), words.next()) {
                    (Some("on"), None) => TracingSwitch::On,
                    (Some("off"), None) => TracingSwitch::Off,
                    _ => TracingSwitch::Invalid,
                };
                Command::Tracing(switch)
            }
            _ => Command::Passthrough(trimmed.to_string()),
        }
    }
}

impl DescribeTarget {
    fn parse<'a>(mut words: impl Iterator<Item = &'a str>) -> Self {
        let target = words.next().map(str::to_lowercase);
        let name = words.next().map(identifier).filter(|n| !n.is_empty());

        match target.as_deref() {
            Some("keyspaces") => DescribeTarget::Keyspaces,
            Some("keyspace") => DescribeTarget::Keyspace(name),
            Some("tables") => DescribeTarget::Tables,
            Some("table") => match name {
                Some(name) => DescribeTarget::Table(name),
                None => DescribeTarget::Unknown,
            },
            _ => DescribeTarget::Unknown,
        }
    }
}

/// Whether a pass-through statement returns rows worth rendering.
pub fn is_select(statement: &str) -> bool {
    statement
        .trim_start()
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_and_noop() {
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("  QUIT; "), Command::Exit);
        assert_eq!(Command::parse(""), Command::Noop);
        assert_eq!(Command::parse("   ;"), Command::Noop);
        assert_eq!(Command::parse("-- a comment;"), Command::Noop);
        assert_eq!(Command::parse("// another"), Command::Noop);
    }

    #[test]
    fn test_use_variants() {
        for stmt in ["use shop;", "USE shop", "use \"shop\";", "  Use   shop  ;  "] {
            assert_eq!(
                Command::parse(stmt),
                Command::UseKeyspace("shop".to_string()),
                "{stmt}"
            );
        }
        assert_eq!(
            Command::parse("use \"MixedCase\";"),
            Command::UseKeyspace("MixedCase".to_string())
        );
    }

    #[test]
    fn test_describe_targets() {
        assert_eq!(
            Command::parse("desc keyspaces;"),
            Command::Describe(DescribeTarget::Keyspaces)
        );
        assert_eq!(
            Command::parse("DESCRIBE KEYSPACE shop"),
            Command::Describe(DescribeTarget::Keyspace(Some("shop".into())))
        );
        assert_eq!(
            Command::parse("desc keyspace;"),
            Command::Describe(DescribeTarget::Keyspace(None))
        );
        assert_eq!(
            Command::parse("desc tables"),
            Command::Describe(DescribeTarget::Tables)
        );
        assert_eq!(
            Command::parse("desc table shop.orders;"),
            Command::Describe(DescribeTarget::Table("shop.orders".into()))
        );
        assert_eq!(
            Command::parse("desc table \"shop\".\"Orders\";"),
            Command::Describe(DescribeTarget::Table("shop.Orders".into()))
        );
        assert_eq!(
            Command::parse("desc table shop.\"orders\""),
            Command::Describe(DescribeTarget::Table("shop.orders".into()))
        );
        assert_eq!(
            Command::parse("desc cluster"),
            Command::Describe(DescribeTarget::Unknown)
        );
        assert_eq!(
            Command::parse("desc table"),
            Command::Describe(DescribeTarget::Unknown)
        );
    }

    #[test]
    fn test_tracing_switch() {
        assert_eq!(
            Command::parse("tracing on;"),
            Command::Tracing(TracingSwitch::On)
        );
        assert_eq!(
            Command::parse("TRACING OFF"),
            Command::Tracing(TracingSwitch::Off)
        );
        assert_eq!(
            Command::parse("tracing maybe"),
            Command::Tracing(TracingSwitch::Invalid)
        );
        assert_eq!(
            Command::parse("tracing"),
            Command::Tracing(TracingSwitch::Invalid)
        );
    }

    #[test]
    fn test_passthrough_is_verbatim() {
        assert_eq!(
            Command::parse("  SELECT * FROM users LIMIT 1;\n"),
            Command::Passthrough("SELECT * FROM users LIMIT 1;".into())
        );
        assert_eq!(
            Command::parse("user_defined_thing;"),
            Command::Passthrough("user_defined_thing;".into())
        );
    }

    #[test]
    fn test_is_select() {
        assert!(is_select("select * from t"));
        assert!(is_select("  SeLeCt 1"));
        assert!(!is_select("insert into t"));
        assert!(!is_select("sel"));
    }
}
