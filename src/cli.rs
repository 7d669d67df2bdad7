//! Command-line interface definitions.
//!
//! Every option is optional: a plain `daily_newscast` run reads its secrets
//! from the environment (or a `.env` file) and uses built-in defaults for the
//! rest.

use clap::Parser;
use std::path::PathBuf;

/// Generate today's newscast script, email it, and publish it to WordPress.
///
/// # Examples
///
/// ```sh
/// # Everything from the environment
/// daily_newscast
///
/// # Custom topics/endpoints and a local copy of the output
/// daily_newscast --config newscast.yaml --output-dir ./out
///
/// # Only publish to the CMS
/// daily_newscast --skip-email
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also write the script (HTML + JSON) and the cover PNG to this directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Do not send the email
    #[arg(long)]
    pub skip_email: bool,

    /// Do not publish to the CMS
    #[arg(long)]
    pub skip_cms: bool,

    /// GNews API key
    #[arg(long, env = "GNEWS_API_KEY", hide_env_values = true)]
    pub gnews_api_key: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Chat model used to write the segments
    #[arg(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    /// SMTP login (also the default sender address)
    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP application password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Sender address, when it differs from the SMTP login
    #[arg(long, env = "EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Email recipient
    #[arg(long, env = "EMAIL_TO")]
    pub email_to: Option<String>,

    /// Email copy recipient
    #[arg(long, env = "EMAIL_CC")]
    pub email_cc: Option<String>,

    /// WordPress site URL, e.g. https://news.example.org
    #[arg(long, env = "WP_BASE_URL")]
    pub wp_base_url: Option<String>,

    /// WordPress user
    #[arg(long, env = "WP_USER")]
    pub wp_user: Option<String>,

    /// WordPress application password
    #[arg(long, env = "WP_APP_PASSWORD", hide_env_values = true)]
    pub wp_app_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_runs_without_arguments() {
        let cli = Cli::parse_from(["daily_newscast"]);
        assert!(cli.config.is_none());
        assert!(cli.output_dir.is_none());
        assert!(!cli.skip_email);
        assert!(!cli.skip_cms);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["daily_newscast", "-c", "/etc/newscast.yaml", "-o", "/tmp/out"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/newscast.yaml")));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_cli_skip_flags() {
        let cli = Cli::parse_from(["daily_newscast", "--skip-email", "--skip-cms"]);
        assert!(cli.skip_email);
        assert!(cli.skip_cms);
    }
}
