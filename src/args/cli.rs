use clap::{Parser, Subcommand};

use super::parsers::{parse_duration_arg, parse_positive_u64};

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// List scenes, their numbered tests, environments and test settings
    List,
}

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Scene-based API load tester - authenticated virtual users, selectable test probes, k6-style load profiles, and HTML/CSV/JSON run reports."
)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Scene to run (homepage, quotation)
    #[arg(long, short = 's', env = "SCENE")]
    pub scene: Option<String>,

    /// Tests to run by number: 'all', '1,3', '2-4' or a mix
    #[arg(long, short = 't', env = "TESTS")]
    pub tests: Option<String>,

    /// Run a single test by identifier (overrides --tests)
    #[arg(long = "test", env = "TEST_FILE", conflicts_with = "tests")]
    pub test: Option<String>,

    /// Target environment (development, staging, preprod, production, or one from the config file)
    #[arg(long, short = 'e', env = "ENVIRONMENT")]
    pub environment: Option<String>,

    /// Test setting (load profile) name
    #[arg(long, env = "TEST_SETTING")]
    pub setting: Option<String>,

    /// Override the number of virtual users
    #[arg(long, short = 'u', env = "USERS", value_parser = parse_positive_u64)]
    pub users: Option<u64>,

    /// Override every scenario duration (supports ms/s/m/h)
    #[arg(long, short = 'd', env = "DURATION", value_parser = parse_duration_arg)]
    pub duration: Option<String>,

    /// Path to config file (TOML or JSON)
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Directory for HTML/CSV/JSON reports
    #[arg(long = "reports-dir", env = "REPORTS_DIR")]
    pub reports_dir: Option<String>,

    /// Ignore test numbers that do not exist instead of failing
    #[arg(long = "lenient-selection")]
    pub lenient_selection: bool,

    /// Override the environment's base URL
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Enable debug logging (set LOADSCENE_LOG or RUST_LOG for custom filters)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}
