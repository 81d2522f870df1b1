use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use dbstrap::config::{InstallerConfig, SourceKind};
use dbstrap::gateway::MysqlGateway;
use dbstrap::persist::{CredentialWriter, SystemAccounts};
use dbstrap::plan::ProvisioningPlan;
use dbstrap::provision::{Outcome, ProvisionReport, Provisioner, SeedOutcome};
use dbstrap::source::{self, Delimiter};
use dbstrap::types::Role;

type Failures = Vec<anyhow::Error>;

#[derive(Parser)]
#[command(name = "dbstrap")]
#[command(about = "Bootstrap a MySQL database, its users and schema tracking table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database, users, grants and tracking table where missing
    Install {
        #[command(flatten)]
        args: ConfigArgs,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Discover and validate credentials without connecting to the server
    Check {
        #[command(flatten)]
        args: ConfigArgs,

        /// Print the resolved plan as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding credential files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Target database name
    #[arg(long)]
    database: Option<String>,

    /// Number of write and read users each
    #[arg(long)]
    pool_size: Option<u32>,

    /// Where credentials are discovered
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// Field delimiter in credential filenames
    #[arg(long, value_enum)]
    delimiter: Option<DelimiterArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Files,
    Env,
}

#[derive(Clone, Copy, ValueEnum)]
enum DelimiterArg {
    Hash,
    Colon,
}

impl ConfigArgs {
    fn into_config(self) -> anyhow::Result<InstallerConfig> {
        let mut config = match &self.config {
            Some(path) => InstallerConfig::load(path)?,
            None => InstallerConfig::default(),
        };

        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(pool_size) = self.pool_size {
            config.pool_size = pool_size;
        }
        if let Some(source) = self.source {
            config.source = match source {
                SourceArg::Files => SourceKind::Files,
                SourceArg::Env => SourceKind::Env,
            };
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = match delimiter {
                DelimiterArg::Hash => Delimiter::Hash,
                DelimiterArg::Colon => Delimiter::Colon,
            };
        }

        config.check()?;
        Ok(config)
    }
}

fn prepare(args: ConfigArgs) -> Result<(InstallerConfig, ProvisioningPlan), Failures> {
    let config = args.into_config().map_err(|e| vec![e])?;
    let source = source::from_config(&config);
    let creds = source::resolve_all(source.as_ref()).map_err(into_failures)?;
    let plan = ProvisioningPlan::build(creds, &config).map_err(into_failures)?;
    Ok((config, plan))
}

fn into_failures(errors: Vec<dbstrap::error::Error>) -> Failures {
    errors.into_iter().map(anyhow::Error::from).collect()
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    server: String,
    root: &'a str,
    database: &'a str,
    pool_size: u32,
    identities: Vec<IdentityOutput>,
}

#[derive(Serialize)]
struct IdentityOutput {
    role: Role,
    principal: String,
}

fn run_check(args: ConfigArgs, json: bool) -> Result<(), Failures> {
    let (_, plan) = prepare(args)?;
    let root = plan.root();
    let n = plan.pool_size();

    if json {
        let output = CheckOutput {
            server: format!("{}:{}", root.host, root.port),
            root: &root.username,
            database: &plan.target().name,
            pool_size: n,
            identities: plan
                .identities()
                .iter()
                .map(|i| IdentityOutput {
                    role: i.role,
                    principal: i.credential.principal(),
                })
                .collect(),
        };
        return print_json(&output);
    }

    println!("credentials OK");
    println!("  server:   {}:{} as {}", root.host, root.port, root.username);
    println!("  database: {}", plan.target().name);
    for identity in plan.identities().iter().filter(|i| i.credential.pool_index.is_none()) {
        println!("  {}: {}", identity.role, identity.credential.principal());
    }
    let pools = plan
        .identities()
        .iter()
        .filter(|i| i.credential.pool_index == Some(0));
    for identity in pools {
        println!(
            "  {}: {}0..{}{} ({n} users)",
            identity.role,
            identity.credential.username,
            identity.credential.username,
            n - 1
        );
    }
    Ok(())
}

fn run_install(args: ConfigArgs, json: bool) -> Result<(), Failures> {
    let (config, plan) = prepare(args)?;

    let gateway = MysqlGateway::connect(plan.root())
        .map_err(|e| vec![anyhow::Error::from(dbstrap::error::Error::from(e))])?;
    let accounts = SystemAccounts;
    let writer = CredentialWriter::new(&config, &accounts);
    let report = match Provisioner::new(&gateway, &writer).run(&plan) {
        Ok(report) => report,
        Err(failure) => {
            if json {
                print_json(&failure.report)?;
            }
            return Err(vec![anyhow::Error::from(failure)]);
        }
    };

    if json {
        return print_json(&report);
    }
    print_summary(&plan, &report);
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<(), Failures> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| vec![e.into()])?;
    println!("{rendered}");
    Ok(())
}

fn print_summary(plan: &ProvisioningPlan, report: &ProvisionReport) {
    let outcome = |o: Option<Outcome>| match o {
        Some(Outcome::Created) => "created",
        Some(Outcome::Skipped) => "already present",
        None => "not reached",
    };

    println!();
    println!("========================================");
    println!("database {}: {}", plan.target().name, outcome(report.database));
    println!(
        "users: {} created, {} already present",
        report.users_created(),
        report.roles.len() - report.users_created()
    );
    println!("credential files written: {}", report.artifacts_written());
    println!("table DatabaseMigration: {}", outcome(report.schema_table));
    match report.seed_row {
        Some(SeedOutcome::Inserted(id)) => println!("seed row created with primary key {id}"),
        Some(SeedOutcome::AlreadyPresent(rows)) => println!("seed row already present ({rows} row(s))"),
        None => {}
    }
    println!("========================================");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dbstrap=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install { args, json } => run_install(args, json),
        Commands::Check { args, json } => run_check(args, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(errors) => {
            for error in &errors {
                eprintln!("error: {error:#}");
            }
            ExitCode::FAILURE
        }
    }
}
