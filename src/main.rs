use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signlab::app::print_line;
use signlab::{
    CameraOpenerBuilder, EventBus, LoginOutcome, Session, SignlabConfig, TaskOutcome, Workflow,
};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "signlab")]
#[command(about = "Sign language recognition workflow: collect, build dataset, train, recognise")]
#[command(version)]
#[command(long_about = "Collects labelled hand-gesture images from a webcam, extracts \
hand-landmark features into a dataset, trains a random forest classifier and runs live \
recognition of fingerspelled letters.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "signlab.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a file
    #[arg(long, value_name = "PATH", help = "Append logs to this file in addition to the console")]
    log_file: Option<String>,

    /// Generated frames instead of the webcam
    #[arg(long, help = "Use a synthetic frame generator instead of the webcam")]
    synthetic_camera: bool,

    /// Colour-based landmark detector instead of the helper process
    #[arg(long, help = "Use the built-in mock hand detector (demos and offline runs)")]
    mock_landmarks: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Account the workflow runs as; checked against the credential store first
#[derive(clap::Args, Debug)]
struct Account {
    #[arg(long, help = "Username of a registered account")]
    user: String,

    #[arg(long, env = "SIGNLAB_PASSWORD", hide_env_values = true, help = "Password of the account")]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user account
    Register {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Check a username and password
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Collect gesture images from the camera
    Collect {
        #[command(flatten)]
        account: Account,
    },
    /// Extract hand landmarks from collected images into the dataset table
    BuildDataset {
        #[command(flatten)]
        account: Account,
    },
    /// Train the classifier on the dataset table
    Train {
        #[command(flatten)]
        account: Account,
    },
    /// Recognise signs live from the camera
    Infer {
        #[command(flatten)]
        account: Account,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting signlab v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match SignlabConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate().context("invalid configuration")?;

    let Some(command) = args.command else {
        eprintln!("No command given, see --help");
        std::process::exit(2);
    };

    let event_bus = if args.debug {
        EventBus::with_debug_logging(config.system.event_bus_capacity)
    } else {
        EventBus::new(config.system.event_bus_capacity)
    };
    let opener = CameraOpenerBuilder::new()
        .config(config.camera.clone())
        .synthetic(args.synthetic_camera)
        .build()?;
    let workflow = Workflow::new(config, event_bus, opener).with_mock_landmarks(args.mock_landmarks);

    let exit_code = match command {
        Command::Register {
            username,
            password,
            confirm_password,
        } => match workflow.register(&username, &password, &confirm_password).await {
            Ok(()) => {
                println!("Account created for '{}', you can now log in", username.trim());
                0
            }
            Err(e) => {
                eprintln!("Registration failed: {}", e);
                1
            }
        },
        Command::Login { username, password } => match workflow.login(&username, &password).await {
            Ok(outcome) => {
                println!("{}", outcome.message());
                if outcome == LoginOutcome::Authenticated {
                    0
                } else {
                    1
                }
            }
            Err(e) => {
                eprintln!("Login failed: {}", e);
                1
            }
        },
        Command::Collect { account } => match open_session(&workflow, &account).await {
            Some(session) => {
                let reason = workflow.collect(&session).await?;
                info!("Collection finished: {:?}", reason);
                0
            }
            None => 1,
        },
        Command::BuildDataset { account } => match open_session(&workflow, &account).await {
            Some(session) => report_outcome(workflow.build_dataset(&session).await?),
            None => 1,
        },
        Command::Train { account } => match open_session(&workflow, &account).await {
            Some(session) => report_outcome(workflow.train(&session).await?),
            None => 1,
        },
        Command::Infer { account } => match open_session(&workflow, &account).await {
            Some(session) => report_outcome(workflow.infer(&session).await?),
            None => 1,
        },
    };

    info!("signlab exited with code: {}", exit_code);
    // Flush the file writer before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

async fn open_session(workflow: &Workflow, account: &Account) -> Option<Session> {
    match workflow.open_session(&account.user, &account.password).await {
        Ok(session) => {
            println!("Logged in as '{}'", session.username());
            Some(session)
        }
        Err(e) => {
            error!("Login for '{}' failed: {}", account.user, e);
            eprintln!("Login failed: {}", e);
            None
        }
    }
}

fn report_outcome(outcome: TaskOutcome) -> i32 {
    print_line(&outcome.message);
    if let Some(evaluation) = &outcome.evaluation {
        print_line(&evaluation.to_string());
    }
    if outcome.success {
        0
    } else {
        1
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("signlab={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file '{}'", path))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Signlab Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every value can be overridden with SIGNLAB_<SECTION>_<KEY> environment variables");
    println!();
    println!("{}", SignlabConfig::default_toml()?);
    Ok(())
}
