//! Binary entrypoint for the firmlink CLI.
//!
//! Commands:
//! - `ports` - list serial ports visible on this system
//! - `init` - create a starter `config.toml`
//! - `watch [--port <path>]` - connect, discover capabilities, stream events
//! - `blink [--pin <n>]` - toggle an output pin (the classic LED check)
//! - `cadence` - live pedal-cadence readout from a reed switch pin
//!
//! See the library crate docs for module-level details: `firmlink::`.
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use firmlink::cadence::{CadenceSmoother, CadenceTracker};
use firmlink::config::Config;
use firmlink::firmata::{Connection, FirmataEvent, PinMode, SerialTransport};

/// How often the poll loops tick the connection.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "firmlink")]
#[command(about = "A Firmata serial-link client for Arduino-class microcontrollers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports visible on this system
    Ports,
    /// Initialize a new configuration file
    Init,
    /// Connect to a board and stream decoded events
    Watch {
        /// Serial port (e.g., /dev/ttyUSB0); overrides the config file
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate; overrides the config file
        #[arg(short, long)]
        baud: Option<u32>,
    },
    /// Blink an output pin
    Blink {
        /// Serial port; overrides the config file
        #[arg(short, long)]
        port: Option<String>,
        /// Digital pin to toggle
        #[arg(long, default_value_t = 13)]
        pin: u8,
        /// Milliseconds between toggles
        #[arg(long, default_value_t = 500)]
        period_ms: u64,
    },
    /// Live cadence (RPM) readout from the configured reed switch pin
    Cadence {
        /// Serial port; overrides the config file
        #[arg(short, long)]
        port: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (Init writes its default later)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Ports => {
            let names = SerialTransport::list_ports()
                .map_err(|e| anyhow!("Failed to enumerate serial ports: {}", e))?;
            if names.is_empty() {
                println!("No serial ports found");
            }
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            println!("Wrote default configuration to {}", cli.config);
            Ok(())
        }
        Commands::Watch { port, baud } => {
            let config = pre_config.unwrap_or_default();
            let mut conn = connect(&config, port, baud)?;
            conn.run_when_ready(|board| {
                let _ = board.query_capabilities();
                // Stream everything the stock firmware can report.
                for p in 0..2u8 {
                    let _ = board.report_digital(p, true);
                }
                for pin in 0..6u8 {
                    let _ = board.report_analog(pin, true);
                }
            });
            run_watch(conn).await
        }
        Commands::Blink {
            port,
            pin,
            period_ms,
        } => {
            let config = pre_config.unwrap_or_default();
            let mut conn = connect(&config, port, None)?;
            conn.run_when_ready(move |board| {
                let _ = board.set_pin_mode(pin, PinMode::Output);
            });
            run_blink(conn, pin, Duration::from_millis(period_ms)).await
        }
        Commands::Cadence { port } => {
            let config = pre_config.clone().unwrap_or_default();
            let pin = config.cadence.pin;
            let mut conn = connect(&config, port, None)?;
            conn.run_when_ready(move |board| {
                let _ = board.set_pin_mode(pin, PinMode::Input);
                let _ = board.report_digital(pin / 8, true);
            });
            run_cadence(conn, &config).await
        }
    }
}

/// Build and open a connection from config plus CLI overrides.
fn connect(config: &Config, port: Option<String>, baud: Option<u32>) -> Result<Connection> {
    let port_name = match port {
        Some(p) => p,
        None if !config.serial.port.is_empty() => config.serial.port.clone(),
        None => SerialTransport::guess_port()
            .ok_or_else(|| anyhow!("No serial port configured and none found to guess"))?,
    };
    let baud_rate = baud.unwrap_or(config.serial.baud_rate);
    let settle = Duration::from_millis(config.serial.settle_ms);
    info!("Connecting to {} at {} baud", port_name, baud_rate);
    let transport = SerialTransport::new(&port_name, baud_rate);
    let mut conn = Connection::new(Box::new(transport), settle);
    conn.open()
        .map_err(|e| anyhow!("Failed to open {}: {}", port_name, e))?;
    Ok(conn)
}

async fn run_watch(mut conn: Connection) -> Result<()> {
    let mut tick = tokio::time::interval(PUMP_INTERVAL);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                conn.poll().map_err(|e| anyhow!("Link failed: {}", e))?;
                while let Some(event) = conn.next_event() {
                    print_event(&event);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, disconnecting");
                conn.disconnect();
                return Ok(());
            }
        }
    }
}

fn print_event(event: &FirmataEvent) {
    match event {
        FirmataEvent::DigitalPort { port, value } => {
            println!("digital port {} = {:#010b}", port, value & 0xFF)
        }
        FirmataEvent::AnalogPin { channel, value } => {
            println!("analog {} = {}", channel, value)
        }
        FirmataEvent::Version { major, minor } => {
            println!("firmware version {}.{}", major, minor)
        }
        FirmataEvent::Capabilities(pins) => {
            println!("{} pins:", pins.len());
            for pin in pins {
                let modes: Vec<String> = pin
                    .capabilities
                    .iter()
                    .map(|c| match c.pin_mode() {
                        Some(mode) => format!("{:?}({})", mode, c.resolution),
                        None => format!("mode{}({})", c.mode, c.resolution),
                    })
                    .collect();
                match pin.analog_channel {
                    Some(ch) => println!("  pin {} [A{}]: {}", pin.number, ch, modes.join(", ")),
                    None => println!("  pin {}: {}", pin.number, modes.join(", ")),
                }
            }
        }
    }
}

async fn run_blink(mut conn: Connection, pin: u8, period: Duration) -> Result<()> {
    let mut tick = tokio::time::interval(PUMP_INTERVAL);
    let mut level = false;
    let mut last_toggle = Instant::now();
    loop {
        tokio::select! {
            _ = tick.tick() => {
                conn.poll().map_err(|e| anyhow!("Link failed: {}", e))?;
                if conn.is_ready() && last_toggle.elapsed() >= period {
                    level = !level;
                    last_toggle = Instant::now();
                    if let Err(e) = conn.board_mut().digital_write(pin, level) {
                        warn!("digital_write failed: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = conn.board_mut().digital_write(pin, false);
                conn.disconnect();
                return Ok(());
            }
        }
    }
}

async fn run_cadence(mut conn: Connection, config: &Config) -> Result<()> {
    let mut tracker = CadenceTracker::new(
        config.cadence.pin,
        config.cadence.debounce_ticks,
        Duration::from_millis(config.cadence.zero_timeout_ms),
    );
    let mut smoother = CadenceSmoother::new(config.cadence.smoothing_window);
    let mut tick = tokio::time::interval(PUMP_INTERVAL);
    let mut last_report = Instant::now();
    loop {
        tokio::select! {
            _ = tick.tick() => {
                conn.poll().map_err(|e| anyhow!("Link failed: {}", e))?;
                if conn.is_ready() {
                    if let Err(e) = tracker.sample(conn.board()) {
                        warn!("cadence sample failed: {}", e);
                    }
                    smoother.push(tracker.rpm());
                    if last_report.elapsed() >= Duration::from_secs(1) {
                        last_report = Instant::now();
                        println!(
                            "cadence: {:.1} rpm (smoothed {:.1}), {} revolutions",
                            tracker.rpm(),
                            smoother.smoothed(),
                            tracker.revolutions()
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                conn.disconnect();
                return Ok(());
            }
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(cfg) = config {
        if verbosity == 0 {
            if let Ok(level) = cfg.logging.level.parse::<log::LevelFilter>() {
                builder.filter_level(level);
            }
        }
        if let Some(ref file) = cfg.logging.file {
            if let Ok(f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
            {
                let mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
                let write_mutex = mutex.clone();
                let is_tty = atty::is(atty::Stream::Stdout);
                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());
                    if let Ok(mut guard) = write_mutex.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }
                    if is_tty {
                        writeln!(fmt, "{}", line)?;
                    }
                    Ok(())
                });
            }
        }
    }
    let _ = builder.try_init();
}
