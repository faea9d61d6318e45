//! # verifield CLI
//!
//! Drives a form session from the command line: check a single email
//! address against the CMS verification endpoint, or fill in and validate a
//! whole form definition.

mod form;
mod paths;

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use verifield::prelude::*;
use verifield_http::HttpTransport;

/// Form validation with remote lookups.
#[derive(Parser, Debug)]
#[command(name = "verifield", version, about)]
struct Cli {
    /// Form settings file (JSON). Defaults to settings.json in the config dir.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// CMS base URL, overriding the settings file.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Quiescence window before a lookup is sent, in milliseconds.
    #[arg(long, global = true, default_value_t = 500)]
    debounce_ms: u64,

    /// Lookup request timeout, in seconds.
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,

    /// Also log to the terminal.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify one email address.
    Email {
        /// Address to verify.
        address: String,
    },
    /// Fill in a form definition and validate it.
    Validate {
        /// Form definition file (JSON).
        form: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    if let Some(file) = paths::run_log_file().and_then(|path| File::create(path).ok()) {
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }
    if verbose {
        loggers.push(TermLogger::new(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logger: {}", e);
    }
}

fn build_session(cli: &Cli) -> Result<FormSession> {
    let mut settings = form::load_settings(cli.settings.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        settings.cms_base_url = base_url.clone();
    }

    let timeout = Duration::from_secs(cli.timeout_secs);
    let transport = HttpTransport::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP transport")?;
    let config = LookupConfig::new()
        .with_debounce(Duration::from_millis(cli.debounce_ms))
        .with_request_timeout(timeout);

    Ok(FormSession::new(settings)
        .with_transport(transport)
        .with_lookup_config(config))
}

fn print_report(report: &FieldReport) {
    let mark = if report.success {
        "✓"
    } else if report.valid {
        "·"
    } else {
        "✗"
    };
    println!("{} {} (lookup: {:?})", mark, report.key, report.lookup);
    for hint in &report.hints {
        println!("    {}", hint);
    }
}

async fn check_email(cli: &Cli, address: &str) -> Result<bool> {
    let mut session = build_session(cli)?;
    if session.settings().cms_base_url.is_empty() {
        anyhow::bail!("No CMS base URL configured; pass --base-url or set it in settings.json");
    }

    let field = session.mount(FieldSchema::new("email").required(), &EmailField)?;
    field.input(address)?;
    field.blur()?;
    session.settle().await;

    let report = field.report();
    print_report(&report);
    session.close();
    Ok(report.valid)
}

async fn validate_form(cli: &Cli, path: &std::path::Path) -> Result<bool> {
    let form = form::load_form(path)?;
    let mut session = build_session(cli)?;

    for def in &form.fields {
        let kind = def.field_kind()?;
        let field = session.mount(def.schema.clone(), kind.as_ref())?;
        if !def.value.is_empty() {
            field.input(def.value.clone())?;
        }
    }
    session.settle().await;

    let result = session.validate();
    for key in session.store().keys() {
        print_report(&session.validity().report(&key));
    }
    match &result {
        ValidationResult::Valid => println!("Form is valid."),
        ValidationResult::Invalid(errors) => {
            println!("Form has {} invalid field(s).", errors.len());
        }
    }
    session.close();
    Ok(result.is_valid())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("{:?}", cli);

    let valid = match &cli.command {
        Commands::Email { address } => check_email(&cli, address).await?,
        Commands::Validate { form } => validate_form(&cli, form).await?,
    };

    Ok(if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
