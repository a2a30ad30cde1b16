use clap::{command, Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use log::info;
use spinners::{Spinner, Spinners};

use coviddash::config::Config;
use coviddash::{persist, Coviddash};

use crate::dashboard;
use crate::display::{display_global_summary, display_top_countries};
use crate::error::CoviddashCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const DOWNLOADING_STRING: &str = "Downloading and processing case tables";

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> CoviddashCliResult<()>;
}

/// The `fetch` command downloads the upstream wide tables and rebuilds the
/// two processed outputs from scratch.
#[derive(Args, Debug)]
pub struct FetchCommand {
    #[arg(
        long,
        default_value_t = false,
        help = "Also fetch the recovered-cases table (no longer maintained upstream)"
    )]
    include_recovered: bool,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for FetchCommand {
    async fn run(&self, config: Config) -> CoviddashCliResult<()> {
        info!("Running `fetch` subcommand");
        let sp = (!self.quiet).then(|| {
            Spinner::with_timer(
                DEFAULT_PROGRESS_SPINNER,
                DOWNLOADING_STRING.to_string() + RUNNING_TAIL_STRING,
            )
        });
        let coviddash = Coviddash::new_with_config(config);
        let tables = coviddash.fetch_and_process(self.include_recovered).await?;
        if let Some(mut s) = sp {
            s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
        }
        println!(
            "Saved processed tables at {}",
            coviddash.config.processed_dir().display()
        );
        println!(
            "  {} ({} rows)",
            tables.country_daily_path.display(),
            tables.country_daily.height()
        );
        println!(
            "  {} ({} rows)",
            tables.global_daily_path.display(),
            tables.global_daily.height()
        );
        Ok(())
    }
}

/// The `summary` command prints the latest global snapshot and the top
/// countries by cumulative confirmed cases.
#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[arg(
        short = 'n',
        long,
        default_value_t = 10,
        help = "Number of countries to list"
    )]
    top: usize,
}

impl RunCommand for SummaryCommand {
    async fn run(&self, config: Config) -> CoviddashCliResult<()> {
        info!("Running `summary` subcommand");
        let processed_dir = config.processed_dir();
        let country_path = processed_dir.join(persist::paths::COUNTRY_DAILY);
        let global_path = processed_dir.join(persist::paths::GLOBAL_DAILY);
        if !country_path.exists() || !global_path.exists() {
            println!("Processed data files not found. Run `coviddash fetch` first.");
            return Ok(());
        }
        let country = persist::read_processed(&country_path)?;
        let global = persist::read_processed(&global_path)?;
        display_global_summary(&global)?;
        display_top_countries(&country, self.top)?;
        Ok(())
    }
}

/// The `dashboard` command launches the interactive terminal dashboard over
/// the processed tables.
#[derive(Args, Debug)]
pub struct DashboardCommand {}

impl RunCommand for DashboardCommand {
    async fn run(&self, config: Config) -> CoviddashCliResult<()> {
        info!("Running `dashboard` subcommand");
        dashboard::run(&config)
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Fetch the JHU CSSE COVID-19 case tables and explore them in your terminal", long_about = None, name="coviddash")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress spinners to stdout. Prompt, results and logs (when\n\
            `RUST_LOG` is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Download the case tables and rebuild the processed outputs
    Fetch(FetchCommand),
    /// Print the latest global snapshot and top countries
    Summary(SummaryCommand),
    /// Launch the interactive terminal dashboard
    Dashboard(DashboardCommand),
}
