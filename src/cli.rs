use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipframe")]
#[command(version)]
#[command(about = "Render a ZIP archive of web content as if it were served by a real origin", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipframe site.zip                          print the rendered entry document\n  \
  zipframe site.zip --navigate docs/a.html   render a document reached by navigation\n  \
  zipframe -l https://example.com/site.zip   list the files of a remote archive")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Navigate to these documents after loading, in order
    #[arg(long, value_name = "PATH")]
    pub navigate: Vec<String>,

    /// Write the rendered document to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Let requests missing from the archive reach the real network
    #[arg(long)]
    pub network: bool,

    /// Write documents without rewriting their resource references
    #[arg(long)]
    pub raw: bool,

    /// List the files of the archive
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Report the outcome as JSON instead of printing the document
    #[arg(long)]
    pub json: bool,

    /// Only report errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// More diagnostics (-vv for everything)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.archive.starts_with("http://") || self.archive.starts_with("https://")
    }

    /// Log filter directive for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cli = Cli::parse_from([
            "zipframe",
            "https://example.com/site.zip",
            "--navigate",
            "a.html",
            "--navigate",
            "b.html",
            "-vv",
        ]);
        assert!(cli.is_http_url());
        assert_eq!(cli.navigate, ["a.html", "b.html"]);
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["zipframe", "a.zip", "-q", "-v"]).is_err());
        let cli = Cli::parse_from(["zipframe", "a.zip", "-q"]);
        assert!(!cli.is_http_url());
        assert_eq!(cli.log_level(), "error");
    }
}
