//! `todo-e2e` - run the to-do app scenarios against a live instance
//!
//! Exit status: 0 when every scenario passes, 1 when any scenario fails,
//! 2 when the run could not be carried out at all.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use todo_e2e::driver::Driver;
use todo_e2e::playwright::{Browser, PlaywrightDriver};
use todo_e2e::{E2eResult, RunnerConfig, Suite, TestRunner};

const DEFAULT_CONFIG_FILE: &str = "todo-e2e.toml";

#[derive(Parser, Debug)]
#[command(name = "todo-e2e")]
#[command(about = "E2E scenario runner for the example to-do app")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to ./todo-e2e.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Suite file or directory of suites (defaults to the built-in to-do suite)
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Origin serving the app under test
    #[arg(long, env = "TODO_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Run only scenarios whose title contains this text
    #[arg(short, long)]
    grep: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Per-step retry timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Command that starts the app under test before the run
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    serve: Option<Vec<String>>,

    /// List planned scenarios and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let config = build_config(&args)?;
    let suites = load_suites(args.spec.as_deref())?;

    if args.list {
        for suite in &suites {
            for scenario in suite.plan() {
                let title = scenario.title();
                if args.grep.as_deref().map_or(true, |g| title.contains(g)) {
                    println!("{}", title);
                }
            }
        }
        return Ok(true);
    }

    let mut runner = TestRunner::with_config(config);

    let visits: BTreeSet<&str> = suites.iter().map(|s| s.visit.as_str()).collect();
    for visit in visits {
        runner.start_server(visit).await?;
    }

    let mut driver = PlaywrightDriver::launch(runner.config().playwright.clone()).await?;

    let outcome = runner
        .run_suites(&mut driver, &suites, args.grep.as_deref())
        .await;

    if let Err(e) = driver.close().await {
        info!("Browser shutdown reported: {}", e);
    }

    let results = outcome?;
    runner.write_results(&results)?;
    runner.stop_server().await?;

    Ok(results.success())
}

fn build_config(args: &Args) -> E2eResult<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            RunnerConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => RunnerConfig::default(),
    };

    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(browser) = &args.browser {
        config.playwright.browser = browser.parse::<Browser>()?;
    }
    if args.headed {
        config.playwright.headless = false;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.command_timeout_ms = timeout_ms;
        config.playwright.action_timeout_ms = timeout_ms;
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(serve) = &args.serve {
        config.server.command = Some(serve.clone());
    }

    config.validate()?;
    Ok(config)
}

fn load_suites(spec: Option<&Path>) -> E2eResult<Vec<Suite>> {
    match spec {
        Some(path) if path.is_dir() => Suite::load_all(path),
        Some(path) => Ok(vec![Suite::from_file(path)?]),
        None => Ok(vec![Suite::builtin()?]),
    }
}
