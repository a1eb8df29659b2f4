// src/cli.rs

use crate::core::shell::ShellOptions;
use anyhow::{Result, anyhow};
use clap::Parser;

/// jobline: run one command line with at most one `|`, `>` or `&` operator.
///
/// Operators are recognised by the first character of a token and must be
/// quoted from the calling shell:
///
///   jobline ls '|' wc -l
///   jobline echo hi '>' out.txt
///   jobline sleep 5 '&'
///   jobline -c "ls | wc -l"
///
/// Set `RUST_LOG=debug` to trace routing, forks and waits.
#[derive(Parser, Debug)]
#[command(author, version, about, verbatim_doc_comment)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// Split LINE into tokens with shell-like word rules instead of reading TOKENS.
    #[arg(short = 'c', long = "command", value_name = "LINE", conflicts_with = "tokens")]
    pub command: Option<String>,

    /// Permission bits, in octal, for files created by `>`. The umask still applies.
    #[arg(long, value_name = "MODE", default_value = "777", value_parser = parse_octal_mode)]
    pub redirect_mode: u32,

    /// The pre-split command line.
    #[arg(value_name = "TOKENS", allow_hyphen_values = true)]
    pub tokens: Vec<String>,
}

impl Cli {
    pub fn options(&self) -> ShellOptions {
        ShellOptions {
            redirect_mode: self.redirect_mode,
        }
    }

    /// Resolves the token sequence from `-c` or from the trailing arguments.
    pub fn into_tokens(self) -> Result<Vec<String>> {
        let tokens = match self.command {
            Some(line) => {
                shlex::split(&line).ok_or_else(|| {
                    anyhow::Error::msg(format!(t!("cli.error.split"), line = line))
                })?
            }
            None => self.tokens,
        };

        if tokens.is_empty() {
            return Err(anyhow!(t!("cli.error.empty")));
        }
        Ok(tokens)
    }
}

/// Parses `644`, `0644` or `0o644` into permission bits.
pub fn parse_octal_mode(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!(t!("cli.error.mode"), value = value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jobline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_trailing_tokens_keep_hyphenated_arguments() {
        let cli = parse(&["ls", "-la", "|", "wc", "-l"]);
        assert_eq!(cli.into_tokens().unwrap(), ["ls", "-la", "|", "wc", "-l"]);
    }

    #[test]
    fn test_command_line_is_split_like_a_shell() {
        let cli = parse(&["-c", "echo 'hello world' > out.txt"]);
        assert_eq!(
            cli.into_tokens().unwrap(),
            ["echo", "hello world", ">", "out.txt"]
        );
    }

    #[test]
    fn test_unbalanced_quotes_are_rejected() {
        let cli = parse(&["-c", "echo 'oops"]);
        assert!(cli.into_tokens().is_err());
    }

    #[test]
    fn test_empty_command_line_is_rejected() {
        assert!(parse(&[]).into_tokens().is_err());
        assert!(parse(&["-c", "   "]).into_tokens().is_err());
    }

    #[test]
    fn test_redirect_mode_defaults_and_parses_octal() {
        assert_eq!(parse(&["true"]).options().redirect_mode, 0o777);
        assert_eq!(
            parse(&["--redirect-mode", "0644", "true"]).options().redirect_mode,
            0o644
        );
        assert_eq!(parse_octal_mode("0o600"), Ok(0o600));
        assert!(parse_octal_mode("999").is_err());
        assert!(parse_octal_mode("17777").is_err());
    }

    #[test]
    fn test_command_conflicts_with_tokens() {
        let result = Cli::try_parse_from(["jobline", "-c", "ls", "extra"]);
        assert!(result.is_err());
    }
}
