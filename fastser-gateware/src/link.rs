use std::mem;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info};

use crate::cdc::{fifo, FifoReader, FifoWriter};
use crate::decoder::Decoder;
use crate::fast_serial::{FastSerialRx, FastSerialTx};
use crate::frontend::Edge;
use crate::packager::Packager;
use crate::pattern::CounterPattern;
use crate::stream::{Beat, Source};
use crate::{GatewareError, Result, SYNCWORD};

/// Host bytes are handed over in chunks of at most this many.
const CHUNK_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub n_bits: u32,
    pub n_words: u32,
    pub syncword: u8,
    pub fifo_capacity: usize,
    /// Port bit sent with every character, and the one the host listens on.
    pub port: bool,
    /// System clock ticks per ADC bit clock edge.
    pub sys_ticks_per_bit: u32,
    /// System ticks held in reset after power on.
    pub reset_cycles: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            n_bits: 8,
            n_words: 21,
            syncword: SYNCWORD,
            fifo_capacity: 8,
            port: true,
            sys_ticks_per_bit: 2,
            reset_cycles: 1023,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        if !(2..=32).contains(&self.n_bits) {
            return Err(GatewareError::Config(format!("n_bits {} not in 2..=32", self.n_bits)));
        }
        if self.n_words == 0 {
            return Err(GatewareError::Config("n_words must be at least 1".into()));
        }
        if self.fifo_capacity == 0 {
            return Err(GatewareError::Config("fifo_capacity must be at least 1".into()));
        }
        if self.sys_ticks_per_bit == 0 {
            return Err(GatewareError::Config("sys_ticks_per_bit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn bytes_per_word(&self) -> usize {
        (self.n_bits as usize + 7) / 8
    }

    /// Bytes per packet on the wire, marker included.
    pub fn packet_len(&self) -> usize {
        self.n_words as usize * self.bytes_per_word() + 1
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sys_ticks: u64,
    pub bit_edges: u64,
    pub words: u64,
    pub characters: u64,
    /// Characters delivered to the host.
    pub bytes: u64,
    /// Characters on the other port, not delivered.
    pub foreign: u64,
}

/// What the system domain reads payload from.
trait Payload: Source<Item = Beat> + Send + 'static {
    fn faulted(&self) -> bool {
        false
    }
}

impl Payload for FifoReader {
    fn faulted(&self) -> bool {
        self.overrun()
    }
}

impl Payload for CounterPattern {}

/// The gateware and the host's serial adapter, running.
///
/// The bit clock domain (`decode` thread) and the system domain (`sys`
/// thread) share nothing but the cdc fifo. The system domain divides its
/// tick down to make the bit clock and sends each edge over a rendezvous
/// channel. Bytes received on the configured port reach the host through
/// `output`; the host's flow control is `output` being full.
///
pub struct Link {
    decode: Option<JoinHandle<Result<u64>>>,
    sys: JoinHandle<Result<LinkStats>>,
}

impl Link {
    /// Run frames from the ADC front end through the whole chain.
    pub fn spawn<I>(config: LinkConfig, edges: I, output: Sender<Vec<u8>>) -> Result<Self>
    where
        I: IntoIterator<Item = Edge>,
        I::IntoIter: Send + 'static,
    {
        config.validate()?;

        let (writer, reader) = fifo(config.fifo_capacity, config.bytes_per_word());
        let (clock_tx, clock_rx) = bounded::<()>(0);

        let decoder = Decoder::new(config.n_bits, config.n_words);
        let edges = edges.into_iter();
        let decode = thread::Builder::new()
            .name("decode".into())
            .spawn(move || run_decode(decoder, writer, edges, clock_rx))?;

        let sys_domain = SysDomain::new(&config, reader, output);
        let ticks_per_bit = config.sys_ticks_per_bit;
        let sys = thread::Builder::new()
            .name("sys".into())
            .spawn(move || sys_domain.run(Some(clock_tx), ticks_per_bit))?;

        info!(n_bits = config.n_bits, n_words = config.n_words, packet_len = config.packet_len(), "link started");

        Ok(Self {
            decode: Some(decode),
            sys,
        })
    }

    /// Run the counter test pattern over the serial link alone.
    pub fn spawn_pattern(config: LinkConfig, pattern: CounterPattern, output: Sender<Vec<u8>>) -> Result<Self> {
        config.validate()?;

        let sys_domain = SysDomain::new(&config, pattern, output);
        let sys = thread::Builder::new()
            .name("sys".into())
            .spawn(move || sys_domain.run(None, 1))?;

        info!("link started with counter pattern");

        Ok(Self {
            decode: None,
            sys,
        })
    }

    /// Wait for both domains. An error in the bit clock domain wins.
    pub fn join(self) -> Result<LinkStats> {
        let decoded = match self.decode {
            Some(handle) => Some(handle.join().map_err(|_| GatewareError::Panicked("decode"))?),
            None => None,
        };
        let sys = self.sys.join().map_err(|_| GatewareError::Panicked("sys"))?;

        let words = decoded.transpose()?.unwrap_or(0);
        let mut stats = sys?;
        stats.words = words;
        Ok(stats)
    }
}

fn run_decode<I>(mut decoder: Decoder, mut writer: FifoWriter, edges: I, clock: Receiver<()>) -> Result<u64>
where
    I: Iterator<Item = Edge>,
{
    let mut words = 0;

    // Only take a clock edge when there is a bit to put on it.
    for edge in edges {
        if clock.recv().is_err() {
            break;
        }
        if let Some(word) = decoder.clock(edge.data, edge.wck) {
            if let Err(e) = writer.push(word) {
                error!(words, "bit clock domain stopped: {}", e);
                return Err(e);
            }
            words += 1;
        }
    }

    debug!(words, "bit clock domain finished");
    Ok(words)
}

struct SysDomain<S> {
    packager: Packager<S>,
    tx: FastSerialTx,
    rx: FastSerialRx,
    port: bool,
    output: Sender<Vec<u8>>,
    pending: Vec<u8>,
    reset_remaining: u32,
    stats: LinkStats,
}

impl<S: Payload> SysDomain<S> {
    fn new(config: &LinkConfig, payload: S, output: Sender<Vec<u8>>) -> Self {
        Self {
            packager: Packager::new(payload, config.syncword),
            tx: FastSerialTx::new(config.port),
            rx: FastSerialRx::new(),
            port: config.port,
            output,
            pending: Vec::with_capacity(CHUNK_LEN),
            reset_remaining: config.reset_cycles,
            stats: LinkStats::default(),
        }
    }

    fn in_reset(&self) -> bool {
        self.reset_remaining > 0
    }

    /// One system tick. Returns the line level.
    fn step(&mut self) -> bool {
        self.stats.sys_ticks += 1;

        if self.reset_remaining > 0 {
            self.reset_remaining -= 1;
            if self.reset_remaining == 0 {
                debug!("system domain out of reset");
            }
            return true;
        }

        let cts = !self.output.is_full();
        let line = self.tx.clock(&mut self.packager, cts);

        if let Some(character) = self.rx.clock(line) {
            self.stats.characters += 1;
            if character.port == self.port {
                self.pending.push(character.data);
            } else {
                self.stats.foreign += 1;
            }
        }

        line
    }

    /// Nothing left anywhere between the payload source and the host.
    fn drained(&self) -> bool {
        self.packager.is_idle() && self.tx.is_idle() && !self.rx.is_busy()
    }

    /// Hand received bytes to the host, a chunk at a time or whenever the
    /// link goes quiet. Returns false once the host is gone.
    fn flush(&mut self, force: bool) -> bool {
        if self.pending.is_empty() {
            // A stalled link has nothing to send; make sure the host is still there.
            if self.output.is_full() {
                if let Err(TrySendError::Disconnected(_)) = self.output.try_send(Vec::new()) {
                    return false;
                }
            }
            return true;
        }
        if !force && self.pending.len() < CHUNK_LEN && !self.drained() {
            return true;
        }

        let chunk = mem::take(&mut self.pending);
        let len = chunk.len() as u64;
        let sent = if force {
            self.output.send(chunk).is_ok()
        } else {
            match self.output.try_send(chunk) {
                Ok(()) => true,
                Err(TrySendError::Full(chunk)) => {
                    self.pending = chunk;
                    return true;
                },
                Err(TrySendError::Disconnected(_)) => false,
            }
        };

        if sent {
            self.stats.bytes += len;
        }
        sent
    }

    fn run(mut self, mut clock: Option<Sender<()>>, ticks_per_bit: u32) -> Result<LinkStats> {
        let mut divider = 0;

        loop {
            // The ADC's frames only start arriving once the fpga is out of reset.
            let running = !self.in_reset();
            self.step();

            if running {
                if let Some(wire) = &clock {
                    if divider == 0 {
                        if wire.send(()).is_ok() {
                            self.stats.bit_edges += 1;
                        } else {
                            debug!("bit clock domain gone, draining");
                            clock = None;
                        }
                    }
                    divider = (divider + 1) % ticks_per_bit;
                }
            }

            if self.packager.sink().faulted() {
                error!("system domain stopped after fifo overrun");
                break;
            }

            if !self.flush(false) {
                info!(bytes = self.stats.bytes, "host went away, link stopped");
                return Ok(self.stats);
            }

            if clock.is_none() && self.drained() {
                break;
            }
        }

        self.flush(true);
        info!(ticks = self.stats.sys_ticks, bytes = self.stats.bytes, "link finished");
        Ok(self.stats)
    }
}
