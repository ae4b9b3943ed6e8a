mod config;

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use config::{Config, ConfigError, Mode};
use jv80_emulator::backplane::{FIBONACCI, RAM_SIZE, RAM_START, ROM_SIZE, ROM_START};
use jv80_emulator::components::IOChannel;
use jv80_emulator::{Address, BackPlane, BackPlaneBuilder, ClockEvent, RunMode};
use thiserror::Error;
use tracing::{debug, error, info, Level};

const KEYBOARD: u8 = 0x0;
const TERMINAL: u8 = 0x1;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not read image {0}: {1}")]
    Image(PathBuf, std::io::Error),

    #[error("Could not read from the console: {0}")]
    Console(std::io::Error),

    #[error(transparent)]
    Machine(#[from] jv80_emulator::Error),
}

/// Runs a raw JV-80 image.
#[derive(Parser, Debug)]
#[clap(name = "jv80-emu", version)]
struct Args {
    /// Raw image to load. Runs the built in Fibonacci program if omitted.
    image: Option<PathBuf>,
    /// Address the image is loaded at.
    #[clap(short, long, value_parser = parse_address, default_value = "0")]
    address: Address,
    /// Load the image write protected.
    #[clap(long)]
    rom: bool,
    /// Address to start executing at. Defaults to the load address.
    #[clap(short, long, value_parser = parse_address)]
    start: Option<Address>,
    /// Clock speed in kHz.
    #[clap(long)]
    speed: Option<f64>,
    #[clap(long, value_enum)]
    run_mode: Option<Mode>,
    /// Stop after this many clock cycles.
    #[clap(long)]
    max_cycles: Option<u64>,
    /// Config file to use instead of the default one.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Print the machine status when it stops.
    #[clap(long)]
    status: bool,
    /// More logging. Repeat for even more.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Accepts `0x1234`, `$1234` and decimal.
fn parse_address(s: &str) -> Result<Address, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix('$')) {
        Some(hex) => Address::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>, AppError> {
    std::fs::read(path).map_err(|err| AppError::Image(path.to_path_buf(), err))
}

fn keyboard(typed: Option<&str>) -> IOChannel {
    let queue = Arc::new(Mutex::new(
        typed.map(|s| s.bytes().collect()).unwrap_or_else(VecDeque::new),
    ));
    let input = queue.clone();
    IOChannel::input(KEYBOARD, "KBD", move || {
        input
            .lock()
            .map_or(0xFF, |mut queue| queue.pop_front().unwrap_or(0xFF))
    })
    .with_status(move || {
        let queued = queue.lock().map_or(0, |queue| queue.len());
        format!("{:1x}. KBD {} queued", KEYBOARD, queued)
    })
}

fn terminal() -> IOChannel {
    IOChannel::output(TERMINAL, "TTY", |value| {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", value as char);
        let _ = stdout.flush();
    })
}

fn create_backplane(args: &Args, config: &Config) -> Result<BackPlane, AppError> {
    let mut builder = BackPlaneBuilder::new();

    if config.banks.is_empty() {
        builder
            .map_memory(ROM_START, ROM_SIZE, false)
            .map_memory(RAM_START, RAM_SIZE, true);
    }
    for bank in &config.banks {
        builder.map_memory(bank.start, bank.size, bank.writable);
        if let Some(path) = &bank.image {
            builder.load_image(bank.start, &read_image(path)?, bank.writable);
        }
    }

    match &args.image {
        Some(path) => {
            let image = read_image(path)?;
            info!("Loading {} to {:04x}", path.display(), args.address);
            builder.load_image(args.address, &image, !args.rom);
        }
        None if config.banks.is_empty() => {
            builder.load_image(ROM_START, &FIBONACCI, false);
        }
        None => {}
    }

    builder
        .map_channel(keyboard(config.keyboard.as_deref()))
        .map_channel(terminal())
        .clock_speed(args.speed.unwrap_or(config.speed_khz))
        .run_mode(args.run_mode.unwrap_or(config.run_mode).into());
    if let Some(max_cycles) = args.max_cycles.or(config.max_cycles) {
        builder.max_cycles(max_cycles);
    }

    let mut backplane = builder.build()?;
    backplane.set_clock_listener(Box::new(|event: &ClockEvent| debug!("Clock: {:?}", event)));
    Ok(backplane)
}

enum Command {
    Step,
    Continue,
    Quit,
}

fn prompt(backplane: &BackPlane) -> Result<Command, AppError> {
    println!("{}", backplane.status());
    print!("[enter] step, [c]ontinue, [q]uit > ");
    std::io::stdout().flush().map_err(AppError::Console)?;

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(AppError::Console)?;
    Ok(match line.trim() {
        _ if read == 0 => Command::Quit,
        "q" => Command::Quit,
        "c" => Command::Continue,
        _ => Command::Step,
    })
}

fn run(args: Args) -> Result<(), AppError> {
    let config = Config::find(args.config.as_deref())?;
    let mut backplane = create_backplane(&args, &config)?;

    let start = args
        .start
        .or(config.start_address)
        .unwrap_or(if args.image.is_some() { args.address } else { ROM_START });

    let mut cycles = backplane.run(Some(start))?;
    while backplane.container().bus().is_suspended() && !backplane.container().bus().is_halted() {
        match prompt(&backplane)? {
            Command::Step => {}
            Command::Continue => backplane.set_run_mode(RunMode::Continuous),
            Command::Quit => break,
        }
        cycles += backplane.run(None)?;
    }
    info!("Stopped after {} cycles", cycles);

    if args.status {
        println!("{}", backplane.status());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
