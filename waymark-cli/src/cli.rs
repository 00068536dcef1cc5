//! Command-line surface: three positional inputs.

use clap::Parser;
use std::path::PathBuf;

/// Drive the staged subject pipeline over a working directory.
///
/// Stages whose outputs already exist are skipped, so re-running after a
/// partial failure resumes where the previous run stopped.
#[derive(Parser, Debug)]
#[command(name = "waymark", version, about)]
pub struct Cli {
    /// Per-subject working directory (absolute, or relative to the
    /// current directory).
    pub working_dir: PathBuf,

    /// Subject identifier used to name artifacts in the working
    /// directory.
    pub subject: String,

    /// Whether to run the long-running sampling sub-step: yes or no
    /// (case-insensitive).
    #[arg(value_parser = parse_yes_no, action = clap::ArgAction::Set)]
    pub sample: bool,
}

/// Parses a case-insensitive yes/no answer.
///
/// # Errors
///
/// Returns a message naming the accepted spellings for anything else.
pub fn parse_yes_no(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "y" => Ok(true),
        "no" | "n" => Ok(false),
        _ => Err(format!("expected yes or no, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_yes_no_case_insensitive() {
        assert_eq!(parse_yes_no("yes"), Ok(true));
        assert_eq!(parse_yes_no("YES"), Ok(true));
        assert_eq!(parse_yes_no("Y"), Ok(true));
        assert_eq!(parse_yes_no("no"), Ok(false));
        assert_eq!(parse_yes_no("No"), Ok(false));
        assert_eq!(parse_yes_no("n"), Ok(false));
    }

    #[test]
    fn test_parse_yes_no_rejects_other() {
        assert!(parse_yes_no("maybe").is_err());
        assert!(parse_yes_no("").is_err());
    }

    #[test]
    fn test_cli_parses_three_positionals() {
        let cli = Cli::try_parse_from(["waymark", "/data/subj01", "subj01", "No"]).unwrap();
        assert_eq!(cli.working_dir, PathBuf::from("/data/subj01"));
        assert_eq!(cli.subject, "subj01");
        assert!(!cli.sample);
    }

    #[test]
    fn test_cli_rejects_bad_flag() {
        assert!(Cli::try_parse_from(["waymark", "/data/subj01", "subj01", "never"]).is_err());
    }

    #[test]
    fn test_cli_requires_all_positionals() {
        assert!(Cli::try_parse_from(["waymark", "/data/subj01"]).is_err());
    }
}
