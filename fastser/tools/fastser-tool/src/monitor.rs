use std::io;

use console::{style, Color};
use tracing::{info, warn};

use crate::codec::pcm;
use crate::receiver::{ByteSource, Receiver, RxError, Result, SampleFrames, SyncState};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub frames: u64,
    pub batches: u64,
    pub resyncs: u64,
}

/// Errors that end a capture without failing it.
fn is_end_of_capture(e: &RxError) -> bool {
    match e {
        RxError::Cancelled => true,
        RxError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

/// Sync, then read batches of `batch` frames and print levels, until the
/// source ends or the read is cancelled. Lost sync is logged and recovered.
pub fn monitor<S: ByteSource>(rx: &mut Receiver<S>, batch: usize, rate: u32) -> Result<MonitorSummary> {
    let nbytes = rx.config().bytes_per_sample;
    let mut summary = MonitorSummary::default();

    loop {
        let result = match rx.state() {
            SyncState::Unsynchronized => rx.sync().map(|()| None),
            SyncState::Synchronized => rx.read(batch).map(Some),
        };

        match result {
            Ok(None) => {
                if summary.batches == 0 {
                    info!("recording");
                }
            },
            Ok(Some(frames)) => {
                let seconds = summary.frames as f64 / f64::from(rate);
                print_levels(seconds, &frames, nbytes);
                summary.frames += frames.len() as u64;
                summary.batches += 1;
            },
            Err(RxError::LostSync { frame, found }) => {
                warn!(frame, found, "resynchronizing");
                summary.resyncs += 1;
            },
            Err(e) if is_end_of_capture(&e) => {
                info!("capture ended: {}", e);
                break;
            },
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}

fn level_color(db: f64) -> Color {
    if db >= -1.0 {
        Color::Red
    } else if db >= -12.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

pub fn print_levels(seconds: f64, frames: &SampleFrames, nbytes: usize) {
    eprint!("{seconds:9.2}s");
    for (channel, peak) in frames.peaks().into_iter().enumerate() {
        let db = pcm::dbfs(peak, nbytes);
        if db.is_finite() {
            eprint!(" {channel}:{}", style(format!("{db:6.1}")).fg(level_color(db)));
        } else {
            eprint!(" {channel}:{}", style("  -inf").dim());
        }
    }
    eprintln!();
}
