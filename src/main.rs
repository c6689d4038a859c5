use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use lbatrim::drives::operations::primitive_for;
use lbatrim::ui::GridRenderer;
use lbatrim::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lbatrim")]
#[command(about = "Discover SSD/NVMe drives and TRIM them with live per-range progress")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List SSD/NVMe drives that can be trimmed
    List {
        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Discard every block of a drive
    Trim(TrimArgs),
}

#[derive(Args)]
struct TrimArgs {
    /// Device path as shown by `lbatrim list`
    device: String,

    /// Number of work units to split the device into
    #[arg(long)]
    units: Option<usize>,

    /// Walk the device without issuing any discards
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Give up once this many units have been rejected
    #[arg(long)]
    max_blocked: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.debug, cli.log_json)?;

    let config = TrimConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::List { json } => list_drives(json),
        Commands::Trim(args) => {
            let code = trim_drive(args, config).await?;
            std::process::exit(code);
        }
    }
}

fn init_tracing(debug: bool, json: bool) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}

#[cfg(unix)]
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

// Windows grants raw disk access per handle; an unprivileged open fails there
#[cfg(not(unix))]
fn is_root() -> bool {
    true
}

fn list_drives(json: bool) -> Result<()> {
    let drives = DriveClassifier::for_platform().enumerate();

    if json {
        println!("{}", serde_json::to_string_pretty(&drives)?);
        return Ok(());
    }

    if drives.is_empty() {
        println!("No SSD/NVMe drives detected.");
        return Ok(());
    }

    println!(
        "{:<22} {:<28} {:<10} {:>10}  {}",
        "Device", "Model", "Type", "Size", "Volumes"
    );
    println!("{}", "-".repeat(90));

    for drive in &drives {
        let volumes = if drive.volumes.is_empty() {
            "-".to_string()
        } else {
            drive.volumes.join(", ")
        };
        println!(
            "{:<22} {:<28} {:<10} {:>10}  {}",
            drive.device_path,
            truncate_string(&drive.model, 28),
            drive.kind_label(),
            format!("{:.2} GB", drive.capacity_gb()),
            volumes
        );
    }

    Ok(())
}

async fn trim_drive(args: TrimArgs, mut config: TrimConfig) -> Result<i32> {
    if let Some(units) = args.units {
        config.units = units;
    }
    if args.max_blocked.is_some() {
        config.max_blocked_units = args.max_blocked;
    }
    if args.dry_run {
        config.primitive = PrimitiveKind::Simulated;
    }
    config.validate()?;

    if !args.dry_run && !is_root() {
        return Err(DriveError::PermissionDenied(
            "TRIM requires root privileges. Run with sudo, or use --dry-run.".into(),
        )
        .into());
    }

    let device = DriveClassifier::for_platform()
        .enumerate()
        .into_iter()
        .find(|d| d.device_path == args.device)
        .with_context(|| {
            format!(
                "{} is not a detected SSD/NVMe drive (see `lbatrim list`)",
                args.device
            )
        })?;

    if !args.dry_run && !args.yes && !confirm(&device)? {
        println!("Aborted.");
        return Ok(1);
    }

    let plan = config.chunk_plan()?;
    let primitive = primitive_for(config.primitive, &config);
    let mut job = TrimJob::new(Arc::new(device), plan, primitive, config.job_options());
    setup_signal_handlers(job.control())?;

    println!(
        "\n{} {} ({} units, {})",
        if args.dry_run { "Dry run on" } else { "Trimming" },
        job.device().display_name().bold(),
        plan.units(),
        format!("{:?}", config.primitive).to_lowercase()
    );
    #[cfg(unix)]
    println!(
        "Ctrl+C cancels, kill -USR1 {} pauses, kill -USR2 {} resumes\n",
        std::process::id(),
        std::process::id()
    );

    let mut events = job.start()?;
    let mut grid = GridRenderer::new(config.grid_rows, config.grid_columns);
    let mut stdout = io::stdout();

    while let Some(event) = events.recv().await {
        grid.apply(&event);
        grid.render(&mut stdout)?;
    }

    let control = job.control();
    let state = tokio::task::spawn_blocking(move || job.wait()).await?;
    let snapshot = serde_json::to_string(&control.snapshot())?;
    tracing::debug!(%state, %snapshot, "Worker joined");

    let code = match grid.outcome() {
        Some(JobOutcome::Completed { message }) => {
            println!("\n{} {}", "✓".green().bold(), message);
            0
        }
        Some(JobOutcome::Failed { error }) => {
            eprintln!("\n{} {}", "✗ TRIM failed:".red().bold(), error);
            1
        }
        Some(JobOutcome::Cancelled) => {
            eprintln!("\n{}", "TRIM cancelled.".yellow().bold());
            130
        }
        None => {
            eprintln!("\n{}", "TRIM worker exited without a result".red());
            1
        }
    };

    Ok(code)
}

fn confirm(device: &DeviceDescriptor) -> Result<bool> {
    println!(
        "\n{}",
        "WARNING: TRIM discards every block on this drive. All data on it will be lost."
            .red()
            .bold()
    );
    println!("Drive: {}", device.display_name());
    if let Some(serial) = &device.serial {
        println!("Serial: {}", serial);
    }

    print!("\nType the device path ({}) to confirm: ", device.device_path);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim() == device.device_path)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

// Ctrl+C / SIGTERM cancel at the next unit boundary; SIGUSR1 pauses, SIGUSR2 resumes
#[cfg(unix)]
fn setup_signal_handlers(control: JobControl) -> Result<()> {
    use signal_hook::{
        consts::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
        iterator::Signals,
    };

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1, SIGUSR2])?;

    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                match sig {
                    SIGINT | SIGTERM => {
                        eprintln!("\nInterrupt received, stopping after the current range...");
                        control.cancel();
                    }
                    SIGUSR1 => {
                        if let Err(e) = control.pause() {
                            tracing::warn!(error = %e, "Pause ignored");
                        }
                    }
                    SIGUSR2 => {
                        if let Err(e) = control.resume() {
                            tracing::warn!(error = %e, "Resume ignored");
                        }
                    }
                    _ => {}
                }
            }
        })?;

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(control: JobControl) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, stopping after the current range...");
            control.cancel();
        }
    });
    Ok(())
}
