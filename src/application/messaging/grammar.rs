//! Argument grammar - Turns command tokens into options and positionals
//!
//! The parser only tokenizes chat text; everything after the command name is
//! handed to an [`ArgumentGrammar`]. [`ClapGrammar`] is the stock
//! implementation backed by a `clap::Command`.

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Arg, ArgAction, ColorChoice, Command};
use serde_json::{Map, Value};
use thiserror::Error;

/// Options and positional values produced by a grammar
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    /// Named options keyed by argument id
    pub options: Map<String, Value>,
    /// One slot per declared positional in index order, `None` when absent
    /// and without default. A trailing variadic positional fills one slot per
    /// value.
    pub positionals: Vec<Option<String>>,
}

/// Errors raised while parsing command arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("help requested")]
    HelpRequested,

    #[error("unknown option '{option}'")]
    UnknownOption {
        option: String,
        suggestion: Option<String>,
    },

    #[error("missing required argument {0}")]
    MissingArgument(String),

    #[error("too many arguments, unexpected '{0}'")]
    TooManyArguments(String),

    #[error("invalid argument {0}")]
    InvalidArgument(String),

    #[error("argument missing for option {0}")]
    MissingValue(String),

    #[error("{0}")]
    Other(String),
}

/// Argument grammar capability attached to a command registration
pub trait ArgumentGrammar: Send + Sync {
    /// Parse the tokens following the command name
    fn parse(&self, tokens: &[String]) -> Result<ParsedArgs, GrammarError>;

    /// Render usage / help text using `display_name` as the program name
    fn render_help(&self, display_name: &str) -> String;

    /// Command name declared by the grammar, if any
    fn name(&self) -> Option<String>;

    /// One-line description
    fn description(&self) -> Option<String>;
}

/// [`ArgumentGrammar`] backed by a `clap::Command`
#[derive(Debug, Clone)]
pub struct ClapGrammar {
    command: Command,
}

impl ClapGrammar {
    pub fn new(command: Command) -> Self {
        let command = command
            .no_binary_name(true)
            .color(ColorChoice::Never)
            .disable_version_flag(true)
            .disable_help_flag(true)
            .arg(
                Arg::new("help")
                    .short('h')
                    .long("help")
                    .help("展示帮助信息")
                    .action(ArgAction::Help),
            );
        Self { command }
    }

    fn collect(&self, matches: &clap::ArgMatches) -> ParsedArgs {
        let mut parsed = ParsedArgs::default();
        let mut positionals: Vec<(usize, Vec<Option<String>>)> = Vec::new();

        for arg in self.command.get_arguments() {
            let id = arg.get_id().as_str();
            let value = match arg.get_action() {
                ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version => continue,
                ArgAction::SetTrue | ArgAction::SetFalse => Value::Bool(matches.get_flag(id)),
                ArgAction::Count => Value::from(matches.get_count(id)),
                _ => {
                    // Raw text so typed value parsers do not hide the value
                    let values: Vec<String> = matches
                        .get_raw(id)
                        .map(|raw| raw.map(|v| v.to_string_lossy().into_owned()).collect())
                        .unwrap_or_default();
                    if arg.is_positional() {
                        let slots = if values.is_empty() {
                            vec![None]
                        } else {
                            values.into_iter().map(Some).collect()
                        };
                        positionals.push((arg.get_index().unwrap_or(usize::MAX), slots));
                        continue;
                    }
                    match values.as_slice() {
                        [] => continue,
                        [single] => Value::String(single.clone()),
                        _ => Value::from(values),
                    }
                }
            };
            parsed.options.insert(id.to_string(), value);
        }

        positionals.sort_by_key(|(index, _)| *index);
        parsed.positionals = positionals.into_iter().flat_map(|(_, slots)| slots).collect();
        parsed
    }
}

impl From<Command> for ClapGrammar {
    fn from(command: Command) -> Self {
        Self::new(command)
    }
}

impl ArgumentGrammar for ClapGrammar {
    fn parse(&self, tokens: &[String]) -> Result<ParsedArgs, GrammarError> {
        let matches = self
            .command
            .clone()
            .try_get_matches_from(tokens)
            .map_err(|e| from_clap(&e))?;
        Ok(self.collect(&matches))
    }

    fn render_help(&self, display_name: &str) -> String {
        self.command
            .clone()
            .bin_name(display_name.to_string())
            .render_help()
            .to_string()
            .replace("Usage:", "用法:")
            .replace("Arguments:", "参数:")
            .replace("Options:", "选项:")
            .replace("[default:", "[默认值:")
    }

    fn name(&self) -> Option<String> {
        let name = self.command.get_name();
        (!name.is_empty()).then(|| name.to_string())
    }

    fn description(&self) -> Option<String> {
        self.command.get_about().map(|about| about.to_string())
    }
}

fn context_text(error: &clap::Error, kind: ContextKind) -> Option<String> {
    match error.get(kind)? {
        ContextValue::String(value) => Some(value.clone()),
        ContextValue::Strings(values) => Some(values.join(", ")),
        _ => None,
    }
}

fn first_line(error: &clap::Error) -> String {
    error
        .render()
        .to_string()
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string()
}

fn from_clap(error: &clap::Error) -> GrammarError {
    let invalid_arg = || context_text(error, ContextKind::InvalidArg).unwrap_or_default();

    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => GrammarError::HelpRequested,
        ErrorKind::UnknownArgument => {
            let arg = invalid_arg();
            if arg.starts_with('-') {
                GrammarError::UnknownOption {
                    option: arg,
                    suggestion: context_text(error, ContextKind::SuggestedArg),
                }
            } else {
                GrammarError::TooManyArguments(arg)
            }
        }
        ErrorKind::TooManyValues | ErrorKind::WrongNumberOfValues => GrammarError::TooManyArguments(invalid_arg()),
        ErrorKind::MissingRequiredArgument => GrammarError::MissingArgument(invalid_arg()),
        ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
            match context_text(error, ContextKind::InvalidValue) {
                Some(value) if value.is_empty() => GrammarError::MissingValue(invalid_arg()),
                _ => GrammarError::InvalidArgument(invalid_arg()),
            }
        }
        _ => GrammarError::Other(first_line(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[&str]) -> Vec<String> {
        input.iter().map(|s| s.to_string()).collect()
    }

    fn ping() -> ClapGrammar {
        ClapGrammar::new(
            Command::new("ping")
                .about("检查Bot是否在线")
                .arg(Arg::new("content").help("要回复的内容").default_value("pong"))
                .arg(Arg::new("reply").short('r').long("reply").value_name("content"))
                .arg(Arg::new("loud").short('l').long("loud").action(ArgAction::SetTrue)),
        )
    }

    #[test]
    fn positional_defaults_and_options() {
        let grammar = ping();

        let parsed = grammar.parse(&[]).unwrap();
        assert_eq!(parsed.positionals, vec![Some("pong".to_string())]);
        assert_eq!(parsed.options["loud"], Value::Bool(false));

        let parsed = grammar.parse(&tokens(&["hello", "-r", "hi", "--loud"])).unwrap();
        assert_eq!(parsed.positionals, vec![Some("hello".to_string())]);
        assert_eq!(parsed.options["reply"], "hi");
        assert_eq!(parsed.options["loud"], Value::Bool(true));
    }

    #[test]
    fn typed_values_are_kept_as_text() {
        let grammar = ClapGrammar::new(
            Command::new("roll")
                .arg(Arg::new("times").short('n').value_parser(clap::value_parser!(u32)))
                .arg(Arg::new("sides").value_parser(clap::value_parser!(u8))),
        );

        let parsed = grammar.parse(&tokens(&["-n", "3", "20"])).unwrap();
        assert_eq!(parsed.options["times"], "3");
        assert_eq!(parsed.positionals, vec![Some("20".to_string())]);

        assert!(matches!(
            grammar.parse(&tokens(&["-n", "three"])),
            Err(GrammarError::InvalidArgument(_))
        ));
    }

    #[test]
    fn absent_positionals_keep_their_slot() {
        let grammar = ClapGrammar::new(
            Command::new("cmd")
                .arg(Arg::new("first"))
                .arg(Arg::new("second").default_value("x")),
        );

        let parsed = grammar.parse(&[]).unwrap();
        assert_eq!(parsed.positionals, vec![None, Some("x".to_string())]);

        let parsed = grammar.parse(&tokens(&["a"])).unwrap();
        assert_eq!(parsed.positionals, vec![Some("a".to_string()), Some("x".to_string())]);
    }

    #[test]
    fn trailing_variadic_fills_one_slot_per_value() {
        let grammar = ClapGrammar::new(
            Command::new("say")
                .arg(Arg::new("target"))
                .arg(Arg::new("words").num_args(1..)),
        );

        let parsed = grammar.parse(&tokens(&["bob", "hi", "there"])).unwrap();
        assert_eq!(
            parsed.positionals,
            vec![Some("bob".to_string()), Some("hi".to_string()), Some("there".to_string())]
        );
    }

    #[test]
    fn help_flag_is_reported() {
        assert_eq!(ping().parse(&tokens(&["-h"])), Err(GrammarError::HelpRequested));
        assert_eq!(ping().parse(&tokens(&["--help"])), Err(GrammarError::HelpRequested));
    }

    #[test]
    fn grammar_errors_are_classified() {
        let grammar = ping();

        assert!(matches!(
            grammar.parse(&tokens(&["--nope"])),
            Err(GrammarError::UnknownOption { .. })
        ));
        assert!(matches!(
            grammar.parse(&tokens(&["a", "b"])),
            Err(GrammarError::TooManyArguments(_))
        ));

        let required = ClapGrammar::new(Command::new("say").arg(Arg::new("text").required(true)));
        assert!(matches!(required.parse(&[]), Err(GrammarError::MissingArgument(_))));
    }

    #[test]
    fn help_text_is_localized() {
        let help = ping().render_help("!ping");
        assert!(help.contains("用法:"));
        assert!(help.contains("!ping"));
        assert!(help.contains("展示帮助信息"));
        assert!(help.contains("默认值:"));
    }

    #[test]
    fn name_and_description() {
        let grammar = ping();
        assert_eq!(grammar.name().as_deref(), Some("ping"));
        assert_eq!(grammar.description().as_deref(), Some("检查Bot是否在线"));
    }
}
