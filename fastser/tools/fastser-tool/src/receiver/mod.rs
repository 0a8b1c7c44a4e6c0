use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::pcm;

pub mod frames;
pub mod source;
pub mod tty;

pub use frames::SampleFrames;
pub use source::{ByteSource, LinkSource};

#[derive(Error, Debug)]
pub enum RxError {
    #[error("lost sync in frame {frame}, found {found:#04x} where the marker belongs")]
    LostSync { frame: usize, found: u8 },

    #[error("not synchronized")]
    NotSynchronized,

    #[error("no data from link for {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("bad frame layout: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RxError>;

/// Shape of the frames on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub channels: usize,
    pub bytes_per_sample: usize,
    pub syncword: u8,
    /// Bytes thrown away, at most, when synchronizing.
    pub flush_len: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            channels: 7,
            bytes_per_sample: 3,
            syncword: fastser_gateware::SYNCWORD,
            flush_len: 1024,
        }
    }
}

impl ReceiverConfig {
    /// Bytes per frame, marker included.
    pub fn frame_len(&self) -> usize {
        self.channels * self.bytes_per_sample + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(RxError::Config("need at least one channel".into()));
        }
        if !(1..=4).contains(&self.bytes_per_sample) {
            return Err(RxError::Config(format!("{} bytes per sample, not in 1..=4", self.bytes_per_sample)));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SyncState {
    Unsynchronized,
    Synchronized,
}

#[derive(Clone, Debug, Default)]
pub struct RxStats {
    pub syncs: u64,
    /// Bytes skipped looking for a marker.
    pub skipped: u64,
    /// Bytes discarded by the flush before synchronizing.
    pub flushed: u64,
    pub frames: u64,
    pub lost_sync: u64,
}

/// Recovers frames from the byte stream by marker position alone.
///
/// `sync()` lines up on a marker byte. `read()` then takes whole frames and
/// checks that every one ends in a marker. Anything going wrong, inside
/// either call, drops back to `Unsynchronized`; getting back is the caller's
/// call to `sync()`.
///
/// A data byte equal to the marker can fool `sync()`. The next `read()`
/// will then fail its marker check, unless the data happens to repeat at
/// the frame period.
///
pub struct Receiver<S> {
    source: S,
    config: ReceiverConfig,
    state: SyncState,
    buf: Vec<u8>,
    stats: RxStats,
}

impl<S: ByteSource> Receiver<S> {
    pub fn new(source: S, config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            state: SyncState::Unsynchronized,
            buf: Vec::new(),
            stats: RxStats::default(),
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn stats(&self) -> &RxStats {
        &self.stats
    }

    pub fn sync(&mut self) -> Result<()> {
        self.state = SyncState::Unsynchronized;

        let flushed = self.source.discard_buffered(self.config.flush_len)?;
        self.stats.flushed += flushed as u64;

        let mut skipped = 0u64;
        let mut byte = [0u8];
        loop {
            self.source.read_exact(&mut byte)?;
            if byte[0] == self.config.syncword {
                break;
            }
            skipped += 1;
        }

        self.stats.skipped += skipped;
        self.stats.syncs += 1;
        self.state = SyncState::Synchronized;
        debug!(flushed, skipped, "receiver: synchronized");
        Ok(())
    }

    /// Read `nframes` frames.
    pub fn read(&mut self, nframes: usize) -> Result<SampleFrames> {
        if self.state != SyncState::Synchronized {
            return Err(RxError::NotSynchronized);
        }

        let frame_len = self.config.frame_len();
        let nch = self.config.channels;
        let nbytes = self.config.bytes_per_sample;

        // Only a batch that checks out restores the state.
        self.state = SyncState::Unsynchronized;

        let len = nframes.checked_mul(frame_len)
            .ok_or_else(|| RxError::Config(format!("{nframes} frames of {frame_len} bytes is too many")))?;
        self.buf.resize(len, 0);
        self.source.read_exact(&mut self.buf)?;

        let syncword = self.config.syncword;
        if let Some(frame) = self.buf.chunks_exact(frame_len).position(|f| f[frame_len - 1] != syncword) {
            let found = self.buf[frame * frame_len + frame_len - 1];
            self.stats.lost_sync += 1;
            warn!(frame, found, "receiver: lost sync");
            return Err(RxError::LostSync { frame, found });
        }

        let mut samples = Vec::with_capacity(nframes * nch);
        for frame in self.buf.chunks_exact(frame_len) {
            samples.extend(frame[..frame_len - 1].chunks_exact(nbytes).map(pcm::decode_be));
        }

        self.stats.frames += nframes as u64;
        self.state = SyncState::Synchronized;
        Ok(SampleFrames::new(nch, samples))
    }
}
