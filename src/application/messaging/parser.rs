//! Command parser - Decodes chat text into commands

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::fmt;

use super::grammar::{ArgumentGrammar, GrammarError};

/// Which command names a registration answers to
#[derive(Debug, Clone)]
pub enum CommandMatcher {
    /// `*`, every command name
    Any,
    Exact(String),
    Pattern(Regex),
}

impl CommandMatcher {
    pub fn matches(&self, command_name: &str) -> bool {
        match self {
            CommandMatcher::Any => true,
            CommandMatcher::Exact(name) => name == command_name,
            CommandMatcher::Pattern(pattern) => pattern.is_match(command_name),
        }
    }
}

impl From<&str> for CommandMatcher {
    fn from(name: &str) -> Self {
        if name == "*" {
            CommandMatcher::Any
        } else {
            CommandMatcher::Exact(name.to_string())
        }
    }
}

impl From<String> for CommandMatcher {
    fn from(name: String) -> Self {
        CommandMatcher::from(name.as_str())
    }
}

impl From<Regex> for CommandMatcher {
    fn from(pattern: Regex) -> Self {
        CommandMatcher::Pattern(pattern)
    }
}

impl fmt::Display for CommandMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandMatcher::Any => write!(f, "*"),
            CommandMatcher::Exact(name) => write!(f, "{}", name),
            CommandMatcher::Pattern(pattern) => write!(f, "{}", pattern.as_str()),
        }
    }
}

/// A successfully parsed command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandInvocation {
    pub prefix: String,
    pub command_name: String,
    /// Named options produced by the grammar
    pub params: Map<String, Value>,
    /// Positional slots from the grammar, or the raw tokens when no grammar
    /// is attached
    pub args: Vec<Option<String>>,
}

/// Result of parsing one message against one registration
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand {
    /// Not addressed to this registration
    NoMatch(&'static str),
    /// Addressed to it but malformed; the text goes back to the sender
    ParseError(String),
    Success(CommandInvocation),
}

/// Splits chat text into prefix, command name and arguments
#[derive(Debug, Clone)]
pub struct CommandParser {
    prefixes: Vec<String>,
}

impl CommandParser {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Prefix used when displaying commands
    pub fn primary_prefix(&self) -> &str {
        self.prefixes.first().map(String::as_str).unwrap_or_default()
    }

    pub fn parse(
        &self,
        raw_message: &str,
        matcher: &CommandMatcher,
        grammar: Option<&dyn ArgumentGrammar>,
    ) -> ParsedCommand {
        let Some(first) = raw_message.chars().next() else {
            return ParsedCommand::NoMatch("empty message");
        };
        let Some(prefix) = self.prefixes.iter().find(|p| p.chars().eq(std::iter::once(first))) else {
            return ParsedCommand::NoMatch("prefix not matched");
        };

        let mut tokens = raw_message.split(' ');
        let command_name = tokens.next().unwrap_or_default()[prefix.len()..].to_string();
        let params: Vec<String> = tokens.filter(|t| !t.is_empty()).map(str::to_string).collect();

        if !matcher.matches(&command_name) {
            return ParsedCommand::NoMatch("command name not matched");
        }

        let Some(grammar) = grammar else {
            return ParsedCommand::Success(CommandInvocation {
                prefix: prefix.clone(),
                command_name,
                params: Map::new(),
                args: params.into_iter().map(Some).collect(),
            });
        };

        match grammar.parse(&params) {
            Ok(parsed) => ParsedCommand::Success(CommandInvocation {
                prefix: prefix.clone(),
                command_name,
                params: parsed.options,
                args: parsed.positionals,
            }),
            Err(GrammarError::HelpRequested) => {
                ParsedCommand::ParseError(self.help_text(matcher, grammar))
            }
            Err(e) => ParsedCommand::ParseError(localize(&e)),
        }
    }

    /// Help text for a command, named after its grammar and shown with the
    /// primary prefix
    pub fn help_text(&self, matcher: &CommandMatcher, grammar: &dyn ArgumentGrammar) -> String {
        let name = display_name(matcher, grammar);
        let prefix = self.primary_prefix();
        let name = if name.contains(prefix) {
            name
        } else {
            format!("{}{}", prefix, name)
        };
        grammar.render_help(&name)
    }
}

/// Grammar name, falling back to the matcher text
pub fn display_name(matcher: &CommandMatcher, grammar: &dyn ArgumentGrammar) -> String {
    grammar.name().unwrap_or_else(|| matcher.to_string())
}

/// User-facing text for a grammar error
pub fn localize(error: &GrammarError) -> String {
    let (message, suggestion) = match error {
        GrammarError::HelpRequested => return String::new(),
        GrammarError::UnknownOption { option, suggestion } => {
            (format!("错误: 未知选项 '{}'", option), suggestion.as_deref())
        }
        GrammarError::MissingArgument(arg) => (format!("错误: 缺少必要参数 {}", arg), None),
        GrammarError::TooManyArguments(arg) => (format!("错误: 参数过多 '{}'", arg), None),
        GrammarError::InvalidArgument(arg) => (format!("错误: 无效参数 {}", arg), None),
        GrammarError::MissingValue(arg) => (format!("错误: 选项 {} 缺少参数", arg), None),
        GrammarError::Other(message) => (format!("错误: {}", message), None),
    };

    match suggestion {
        Some(suggestion) => format!("{}\n你是想要 '{}'?", message, suggestion),
        None => format!("{}\n(使用 -h 获取帮助信息)", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::messaging::grammar::ClapGrammar;
    use clap::{Arg, Command};

    fn parser() -> CommandParser {
        CommandParser::new(vec!["!".to_string(), "/".to_string()])
    }

    fn success(parsed: ParsedCommand) -> CommandInvocation {
        match parsed {
            ParsedCommand::Success(invocation) => invocation,
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn parses_plain_command() {
        let invocation = success(parser().parse("!ping hello", &"ping".into(), None));
        assert_eq!(invocation.prefix, "!");
        assert_eq!(invocation.command_name, "ping");
        assert_eq!(invocation.args, vec![Some("hello".to_string())]);
        assert!(invocation.params.is_empty());
    }

    #[test]
    fn unknown_prefix_or_name_does_not_match() {
        let parser = parser();
        assert!(matches!(parser.parse("?ping", &"ping".into(), None), ParsedCommand::NoMatch(_)));
        assert!(matches!(parser.parse("!pong", &"ping".into(), None), ParsedCommand::NoMatch(_)));
        assert!(matches!(parser.parse("", &"ping".into(), None), ParsedCommand::NoMatch(_)));
    }

    #[test]
    fn wildcard_and_pattern_matchers() {
        let parser = parser();
        let any = success(parser.parse("/whatever  a  b", &"*".into(), None));
        assert_eq!(any.command_name, "whatever");
        assert_eq!(any.args, vec![Some("a".to_string()), Some("b".to_string())]);

        let pattern = CommandMatcher::from(Regex::new("^p[io]ng$").unwrap());
        assert!(matches!(parser.parse("!pong", &pattern, None), ParsedCommand::Success(_)));
        assert!(matches!(parser.parse("!pang", &pattern, None), ParsedCommand::NoMatch(_)));
    }

    #[test]
    fn grammar_errors_become_user_text() {
        let grammar = ClapGrammar::new(Command::new("echo").arg(Arg::new("text").required(true)));
        let parsed = parser().parse("!echo", &"echo".into(), Some(&grammar));
        match parsed {
            ParsedCommand::ParseError(text) => {
                assert!(text.starts_with("错误: 缺少必要参数"));
                assert!(text.ends_with("(使用 -h 获取帮助信息)"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn help_request_returns_help_text() {
        let grammar = ClapGrammar::new(Command::new("echo").about("复读").arg(Arg::new("text")));
        let parsed = parser().parse("!echo -h", &"echo".into(), Some(&grammar));
        match parsed {
            ParsedCommand::ParseError(text) => {
                assert!(text.contains("用法:"));
                assert!(text.contains("!echo"));
            }
            other => panic!("expected help text, got {:?}", other),
        }
    }

    #[test]
    fn grammar_values_reach_invocation() {
        let grammar = ClapGrammar::new(
            Command::new("ping").arg(Arg::new("content").default_value("pong")),
        );
        let invocation = success(parser().parse("!ping", &"ping".into(), Some(&grammar)));
        assert_eq!(invocation.args, vec![Some("pong".to_string())]);
    }

    #[test]
    fn suggestion_replaces_help_hint() {
        let text = localize(&GrammarError::UnknownOption {
            option: "--replay".to_string(),
            suggestion: Some("--reply".to_string()),
        });
        assert_eq!(text, "错误: 未知选项 '--replay'\n你是想要 '--reply'?");
    }
}
