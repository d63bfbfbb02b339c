//! `panelmatch` command line entry point.
//!
//! # Responsibility
//! - Parse run options, initialize logging, open the roster database.
//! - Print the run report and map failures to exit codes.

use clap::Parser;
use log::error;
use panelmatch_core::db::open_db;
use panelmatch_core::{
    core_version, default_log_level, init_logging, AssignmentConfig, AssignmentService,
    ConfigError, ServiceError, SqliteRosterRepository, DEFAULT_CAPACITY,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Assign patients to primary-care providers by site proximity.
#[derive(Parser, Debug)]
#[command(name = "panelmatch", version)]
struct Args {
    /// Path to the roster SQLite database.
    #[arg(long, value_name = "PATH", env = "PANELMATCH_DB")]
    db: PathBuf,

    /// Maximum patients per provider.
    #[arg(long, env = "PANELMATCH_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    capacity: u32,

    /// Count patients already assigned in the database toward capacity.
    #[arg(long)]
    seed_existing_load: bool,

    /// Compute assignments without writing them.
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Maximum unassigned patient ids listed in the report.
    #[arg(long, default_value_t = 50)]
    unassigned_sample: usize,

    /// trace|debug|info|warn|error
    #[arg(long, env = "PANELMATCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; stderr when omitted.
    #[arg(long, value_name = "DIR", env = "PANELMATCH_LOG_DIR")]
    log_dir: Option<String>,
}

impl Args {
    fn config(&self) -> Result<AssignmentConfig, ConfigError> {
        let config = AssignmentConfig {
            seed_existing_load: self.seed_existing_load,
            dry_run: self.dry_run,
            unassigned_sample_limit: self.unassigned_sample,
            ..AssignmentConfig::with_capacity(self.capacity)?
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = args.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = init_logging(level, args.log_dir.as_deref()) {
        eprintln!("panelmatch: logging setup failed: {err}");
        return ExitCode::from(2);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("panelmatch: {err}");
            ExitCode::from(exit_code_for(err.as_ref()))
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config()?;
    let mut conn = open_db(&args.db)?;
    let repo = SqliteRosterRepository::try_new(&mut conn)?;
    let mut service = AssignmentService::new(repo);

    let report = service.run(&config)?;
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("panelmatch {}", core_version());
        print!("{report}");
    }
    Ok(())
}

fn exit_code_for(err: &(dyn std::error::Error + 'static)) -> u8 {
    match err.downcast_ref::<ServiceError>() {
        Some(ServiceError::DataUnavailable { .. }) => 3,
        Some(ServiceError::PersistenceFailed { .. }) => 4,
        Some(ServiceError::Config(_)) => 2,
        _ if err.is::<ConfigError>() => 2,
        _ => 1,
    }
}
