use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, Args};
use fastser_gateware::GatewareError;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::dump::dump;
use crate::linktest::{counter_layout, linktest};
use crate::monitor::monitor;
use crate::receiver::tty::Tty;
use crate::receiver::{LinkSource, Receiver, ReceiverConfig, RxError};
use crate::simulate::{simulate, Pattern, SimulateOptions};

mod codec;
mod dump;
mod generator;
mod linktest;
mod monitor;
mod receiver;
mod simulate;

#[derive(Error, Debug)]
pub(crate) enum ToolError {
    #[error(transparent)]
    Rx(#[from] RxError),

    #[error(transparent)]
    Gateware(#[from] GatewareError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("verification failed: {0} bad")]
    Verify(usize),
}

pub(crate) type Result<T> = std::result::Result<T, ToolError>;

#[derive(Parser)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

fn parse_marker(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("bad marker byte {s:?}: {e}"))
}

/// How the receiver finds frames.
#[derive(Args, Clone)]
pub(crate) struct SyncArgs {
    /// Sync marker byte, decimal or 0x-prefixed hex.
    #[clap(long, default_value = "0x47", parse(try_from_str = parse_marker))]
    pub marker: u8,

    /// Bytes discarded, at most, before synchronizing.
    #[clap(long, default_value_t = 1024)]
    pub flush: usize,
}

impl SyncArgs {
    /// Layout of the counter test pattern.
    fn counter_config(&self) -> ReceiverConfig {
        counter_layout(&ReceiverConfig {
            syncword: self.marker,
            flush_len: self.flush,
            ..ReceiverConfig::default()
        })
    }
}

/// Frame layout on the wire.
#[derive(Args, Clone)]
pub(crate) struct LayoutArgs {
    #[clap(long, default_value_t = 7)]
    pub channels: usize,

    #[clap(long, default_value_t = 3)]
    pub bytes_per_sample: usize,

    #[clap(flatten)]
    pub sync: SyncArgs,
}

impl LayoutArgs {
    fn config(&self) -> ReceiverConfig {
        ReceiverConfig {
            channels: self.channels,
            bytes_per_sample: self.bytes_per_sample,
            syncword: self.sync.marker,
            flush_len: self.sync.flush,
        }
    }
}

#[derive(Args, Clone)]
pub(crate) struct TtyArgs {
    #[clap(short, long, default_value = "/dev/ttyUSB2")]
    pub tty: PathBuf,

    /// Give up when the link is silent this long. Zero waits forever.
    #[clap(long, default_value_t = 2000)]
    pub timeout_ms: u64,
}

impl TtyArgs {
    /// The tty must outlive the capture; its drop restores the terminal.
    fn open(&self, realtime: Option<(u32, u32)>) -> Result<(Tty, LinkSource)> {
        let tty = receiver::tty::open(&self.tty)?;
        let source = LinkSource::from_reader(tty.reader()?, realtime)?;
        let source = match self.timeout_ms {
            0 => source,
            ms => source.with_timeout(Duration::from_millis(ms)),
        };
        Ok((tty, source))
    }
}

#[derive(Args)]
pub(crate) struct MonitorArgs {
    #[clap(flatten)]
    tty: TtyArgs,

    #[clap(flatten)]
    layout: LayoutArgs,

    /// Sample rate, for the time column.
    #[clap(short, long, default_value_t = 16000)]
    rate: u32,

    /// Frames per batch.
    #[clap(short = 'n', long, default_value_t = 512)]
    frames: usize,

    /// Stop after this many seconds.
    #[clap(long)]
    seconds: Option<f64>,
}

#[derive(Args)]
pub(crate) struct DumpArgs {
    #[clap(flatten)]
    tty: TtyArgs,

    #[clap(flatten)]
    layout: LayoutArgs,

    #[clap(short = 'n', long, default_value_t = 16)]
    frames: usize,

    /// Raw sample bits in hex instead of signed decimal.
    #[clap(long)]
    hex: bool,
}

#[derive(Args)]
pub(crate) struct LinkTestArgs {
    #[clap(flatten)]
    tty: TtyArgs,

    #[clap(flatten)]
    sync: SyncArgs,

    /// Packets to check.
    #[clap(short = 'n', long, default_value_t = 1000)]
    packets: usize,
}

#[derive(Args)]
pub(crate) struct SimulateArgs {
    #[clap(flatten)]
    layout: LayoutArgs,

    /// Frames (tones) or packets (counter) to push through.
    #[clap(short = 'n', long, default_value_t = 1000)]
    frames: usize,

    #[clap(long, arg_enum, default_value = "tones")]
    pattern: Pattern,

    /// Gateware system clocks per ADC bit clock.
    #[clap(long, default_value_t = 2)]
    sys_ticks_per_bit: u32,

    #[clap(short, long, default_value_t = 16000)]
    rate: u32,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    #[clap(name="monitor")]
    Monitor(MonitorArgs),

    #[clap(name="dump")]
    Dump(DumpArgs),

    #[clap(name="linktest")]
    Linktest(LinkTestArgs),

    #[clap(name="simulate")]
    Simulate(SimulateArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Cli::parse();

    if let Err(e) = run(args.command) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Monitor(a) => {
            let (_tty, source) = a.tty.open(Some((a.frames as u32, a.rate)))?;

            if let Some(seconds) = a.seconds {
                let canceller = source.canceller();
                thread::Builder::new()
                    .name("stop".into())
                    .spawn(move || {
                        thread::sleep(Duration::from_secs_f64(seconds));
                        canceller.cancel();
                    })?;
            }

            let mut rx = Receiver::new(source, a.layout.config())?;
            let summary = monitor(&mut rx, a.frames, a.rate)?;
            let stats = rx.stats();
            info!(frames = stats.frames, resyncs = summary.resyncs, syncs = stats.syncs,
                skipped = stats.skipped, flushed = stats.flushed, lost_sync = stats.lost_sync,
                "done: monitor");
        },
        Commands::Dump(a) => {
            let (_tty, source) = a.tty.open(None)?;
            let mut rx = Receiver::new(source, a.layout.config())?;
            let stdout = io::stdout();
            dump(&mut rx, a.frames, a.hex, &mut stdout.lock())?;
        },
        Commands::Linktest(a) => {
            let (_tty, source) = a.tty.open(None)?;
            let mut rx = Receiver::new(source, a.sync.counter_config())?;
            let report = linktest(&mut rx, a.packets)?;
            let stats = rx.stats();
            info!(skipped = stats.skipped, flushed = stats.flushed, "linktest: receiver");
            report.print();
            if !report.passed() {
                return Err(ToolError::Verify(report.bad));
            }
        },
        Commands::Simulate(a) => {
            let opts = SimulateOptions {
                frames: a.frames,
                pattern: a.pattern,
                sys_ticks_per_bit: a.sys_ticks_per_bit,
                rate: a.rate,
                layout: a.layout.config(),
                timeout: Duration::from_secs(5),
            };
            let report = simulate(&opts)?;
            report.print();
            if !report.passed() {
                return Err(ToolError::Verify(report.unmatched));
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_parsing() {
        let expected = [
            ("0x47", Some(0x47)),
            ("0XFF", Some(0xff)),
            ("71",   Some(71)),
            ("0x100", None),
            ("256",  None),
            ("zz",   None),
        ];

        for (input, value) in expected {
            assert_eq!(parse_marker(input).ok(), value, "input {input:?}");
        }
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["fastser-tool", "monitor"]);
        match cli.command {
            Commands::Monitor(a) => {
                assert_eq!(a.tty.tty, PathBuf::from("/dev/ttyUSB2"));
                assert_eq!(a.rate, 16000);
                assert_eq!(a.frames, 512);
                assert_eq!(a.layout.config(), ReceiverConfig::default());
            },
            _ => panic!("expected monitor"),
        }
    }

    #[test]
    fn cli_simulate_flags() {
        let cli = Cli::parse_from([
            "fastser-tool", "simulate", "--pattern", "counter", "-n", "10",
            "--sys-ticks-per-bit", "3", "--marker", "0x5a",
        ]);
        match cli.command {
            Commands::Simulate(a) => {
                assert_eq!(a.pattern, Pattern::Counter);
                assert_eq!(a.frames, 10);
                assert_eq!(a.sys_ticks_per_bit, 3);
                assert_eq!(a.layout.sync.marker, 0x5a);
            },
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn cli_linktest_takes_no_layout() {
        let cli = Cli::parse_from(["fastser-tool", "linktest", "--marker", "0x5a", "--flush", "0"]);
        match cli.command {
            Commands::Linktest(a) => {
                let config = a.sync.counter_config();
                assert_eq!(config.channels, 32);
                assert_eq!(config.bytes_per_sample, 1);
                assert_eq!(config.syncword, 0x5a);
                assert_eq!(config.flush_len, 0);
            },
            _ => panic!("expected linktest"),
        }

        assert!(Cli::try_parse_from(["fastser-tool", "linktest", "--channels", "4"]).is_err());
        assert!(Cli::try_parse_from(["fastser-tool", "linktest", "--bytes-per-sample", "2"]).is_err());
    }
}
