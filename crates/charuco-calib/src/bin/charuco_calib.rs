//! charuco-calib CLI: calibrate a camera from a folder of ChArUco images.

use charuco_calib::{write_board_image, CalibrationConfig, RunError};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "charuco-calib")]
#[command(about = "Camera intrinsic calibration from ChArUco board images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log verbosity on stderr (`RUST_LOG` overrides it with `tracing`).
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate from every jpg/jpeg/png image in a folder.
    Calibrate(CalibrateArgs),

    /// Render a printable image of the configured board.
    PrintBoard(PrintBoardArgs),
}

#[derive(Debug, Clone, Default, Args)]
struct CalibrateArgs {
    /// Image folder (overrides the config file; default ./etc/charuco_imgs/).
    dir: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the full report (outcomes, poses, per-view errors) as JSON.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Minimum interpolated corners for an image to be used.
    #[arg(long)]
    min_corners: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct PrintBoardArgs {
    /// Output image path (PNG recommended).
    out: PathBuf,

    /// JSON configuration file providing the board.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pixels per board square.
    #[arg(long, default_value = "100")]
    px_per_square: usize,

    /// White margin around the board in pixels.
    #[arg(long, default_value = "40")]
    margin: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    charuco_calib::core::init_tracing(cli.log_level.into(), cli.log_json);
    #[cfg(not(feature = "tracing"))]
    {
        let _ = charuco_calib::core::init_with_level(cli.log_level.into());
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<CalibrationConfig, RunError> {
    match path {
        Some(p) => Ok(CalibrationConfig::load_json(p)?),
        None => Ok(CalibrationConfig::default()),
    }
}

fn run_calibrate(args: &CalibrateArgs) -> Result<(), RunError> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(dir) = &args.dir {
        config.images_dir = dir.clone();
    }
    if let Some(n) = args.min_corners {
        config.min_corners = n;
    }

    let runner = config.build_runner()?;
    let report = runner.run_with(&config.images_dir, |listed| {
        print!("{}", listed.listing());
    })?;
    print!("{}", report.results());
    if let Some(out) = &args.output {
        report.write_json(out)?;
        log::info!("report written to {}", out.display());
    }
    Ok(())
}

fn run_print_board(args: &PrintBoardArgs) -> Result<(), RunError> {
    let config = load_config(args.config.as_ref())?;
    let board = config.build_board().map_err(charuco_calib::ConfigError::from)?;
    let (w, h) = write_board_image(&board, args.px_per_square, args.margin, &args.out)?;
    println!("Board image {w}x{h} written to {}", args.out.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match &cli.command {
        Some(Commands::Calibrate(args)) => run_calibrate(args),
        Some(Commands::PrintBoard(args)) => run_print_board(args),
        // bare invocation calibrates the default folder
        None => run_calibrate(&CalibrateArgs::default()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
