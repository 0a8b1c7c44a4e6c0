use std::io;
use std::time::Duration;

use clap::ArgEnum;
use console::{style, Color};
use crossbeam::channel::bounded;
use fastser_gateware::{serialize_frames, CounterPattern, Link, LinkConfig, LinkStats};
use tracing::info;

use crate::codec::pcm;
use crate::generator::tone::ChannelTones;
use crate::linktest::{counter_layout, LinkTestReport};
use crate::receiver::{ByteSource, LinkSource, Receiver, ReceiverConfig, RxError, SyncState};

/// Chunks the model may queue up for the host before flow control kicks in.
const OUTPUT_DEPTH: usize = 1024;

/// Idle bit clocks between ADC frames.
const FRAME_GAP_BITS: usize = 8;

const BASE_HZ: f32 = 440.0;

#[derive(ArgEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Pattern {
    Tones,
    Counter,
}

pub(crate) struct SimulateOptions {
    pub frames: usize,
    pub pattern: Pattern,
    pub sys_ticks_per_bit: u32,
    pub rate: u32,
    pub layout: ReceiverConfig,
    pub timeout: Duration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SimReport {
    pub generated: usize,
    pub received: usize,
    /// Received frames that don't line up with what was generated.
    pub unmatched: usize,
    pub resyncs: usize,
    pub link: LinkStats,
}

impl SimReport {
    pub fn passed(&self) -> bool {
        self.unmatched == 0 && self.received > 0
    }

    pub fn print(&self) {
        let verdict = if self.passed() {
            style("PASS").fg(Color::Green)
        } else {
            style("FAIL").fg(Color::Red)
        };
        eprintln!("simulate: [{}] generated {} received {} unmatched {} resyncs {}",
            verdict, self.generated, self.received, self.unmatched, self.resyncs);
        eprintln!("simulate: {} sys ticks, {} bit clocks, {} words, {} bytes to host",
            self.link.sys_ticks, self.link.bit_edges, self.link.words, self.link.bytes);
    }
}

/// Run the gateware model into the host receiver and check what comes out.
pub(crate) fn simulate(opts: &SimulateOptions) -> crate::Result<SimReport> {
    match opts.pattern {
        Pattern::Tones => simulate_tones(opts),
        Pattern::Counter => simulate_counter(opts),
    }
}

/// Hand every frame to `each` until the link closes. Returns the number
/// of times sync had to be found again.
fn receive_all<S: ByteSource>(rx: &mut Receiver<S>, mut each: impl FnMut(&[i32])) -> Result<usize, RxError> {
    let mut resyncs = 0;
    let mut synced_once = false;

    loop {
        let result = match rx.state() {
            SyncState::Unsynchronized => rx.sync().map(|()| None),
            SyncState::Synchronized => rx.read(1).map(Some),
        };

        match result {
            Ok(Some(frames)) => each(frames.frame(0)),
            Ok(None) => {
                if synced_once {
                    resyncs += 1;
                }
                synced_once = true;
            },
            Err(RxError::LostSync { .. }) => {},
            Err(RxError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }

    Ok(resyncs)
}

fn simulate_tones(opts: &SimulateOptions) -> crate::Result<SimReport> {
    let layout = &opts.layout;
    let nbytes = layout.bytes_per_sample;
    let channels = layout.channels;

    let mut tones = ChannelTones::new(channels, BASE_HZ, opts.rate as f32, nbytes);
    let frames: Vec<Vec<i32>> = (0..opts.frames).map(|_| tones.next_frame()).collect();

    // The ADC side runs in bytes: one 8 bit word per sample byte.
    let words: Vec<Vec<u32>> = frames.iter()
        .map(|frame| {
            let mut bytes = vec![0u8; channels * nbytes];
            for (&sample, out) in frame.iter().zip(bytes.chunks_exact_mut(nbytes)) {
                pcm::encode_be(sample, out);
            }
            bytes.into_iter().map(u32::from).collect()
        })
        .collect();

    let config = LinkConfig {
        n_bits: 8,
        n_words: (channels * nbytes) as u32,
        syncword: layout.syncword,
        sys_ticks_per_bit: opts.sys_ticks_per_bit,
        ..LinkConfig::default()
    };
    info!(frames = opts.frames, channels, nbytes, "simulate: tones");

    let (output, chunks) = bounded(OUTPUT_DEPTH);
    let link = Link::spawn(config, serialize_frames(words, 8, FRAME_GAP_BITS), output)?;

    let mut rx = Receiver::new(LinkSource::new(chunks).with_timeout(opts.timeout), layout.clone())?;

    // Frames lost around a resync are skipped, never reordered.
    let mut cursor = 0;
    let mut received = 0;
    let mut unmatched = 0;
    let result = receive_all(&mut rx, |frame| {
        received += 1;
        match frames[cursor..].iter().position(|f| f.as_slice() == frame) {
            Some(offset) => cursor += offset + 1,
            None => unmatched += 1,
        }
    });
    drop(rx);

    let link = link.join()?;
    let resyncs = result?;

    Ok(SimReport {
        generated: opts.frames,
        received,
        unmatched,
        resyncs,
        link,
    })
}

fn simulate_counter(opts: &SimulateOptions) -> crate::Result<SimReport> {
    let layout = counter_layout(&opts.layout);
    let config = LinkConfig {
        syncword: layout.syncword,
        ..LinkConfig::default()
    };
    info!(packets = opts.frames, "simulate: counter pattern");

    let (output, chunks) = bounded(OUTPUT_DEPTH);
    let link = Link::spawn_pattern(config, CounterPattern::with_packets(opts.frames as u64), output)?;

    let mut rx = Receiver::new(LinkSource::new(chunks).with_timeout(opts.timeout), layout)?;

    let mut report = LinkTestReport::default();
    let result = receive_all(&mut rx, |frame| report.check(frame));
    drop(rx);

    let link = link.join()?;
    let resyncs = result?;

    Ok(SimReport {
        generated: opts.frames,
        received: report.packets,
        unmatched: report.bad,
        resyncs,
        link,
    })
}
