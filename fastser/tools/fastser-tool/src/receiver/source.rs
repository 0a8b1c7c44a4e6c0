use std::io::{self, Read};
use std::thread;
use std::time::{Duration, Instant};

use audio_thread_priority::promote_current_thread_to_real_time;
use crossbeam::channel::{after, bounded, never, select, Receiver, Sender};
use tracing::{debug, warn};

use super::{Result, RxError};

/// Chunks buffered between the pump thread and the receiver.
const CHUNK_QUEUE_DEPTH: usize = 256;

const READ_CHUNK_LEN: usize = 4096;

/// Where the receiver gets its bytes from.
pub trait ByteSource {
    /// Fill `buf` completely, blocking as needed.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Throw away up to `max` bytes that have already arrived, without
    /// waiting for more. Returns how many went.
    fn discard_buffered(&mut self, max: usize) -> Result<usize>;
}

/// Byte stream arriving over a crossbeam channel in chunks.
///
/// Chunks come either straight from the gateware model or from a `link_rx`
/// pump thread reading a tty or file. Blocking reads can time out and can
/// be cancelled from another thread.
///
pub struct LinkSource {
    chunks: Receiver<Vec<u8>>,
    errors: Receiver<io::Error>,
    cancel_rx: Receiver<()>,
    // Held so that `cancel_rx` never reports disconnected.
    cancel_tx: Sender<()>,
    pending: Vec<u8>,
    position: usize,
    timeout: Option<Duration>,
}

impl LinkSource {
    pub fn new(chunks: Receiver<Vec<u8>>) -> Self {
        Self::with_errors(chunks, never())
    }

    fn with_errors(chunks: Receiver<Vec<u8>>, errors: Receiver<io::Error>) -> Self {
        let (cancel_tx, cancel_rx) = bounded(1);
        Self {
            chunks,
            errors,
            cancel_rx,
            cancel_tx,
            pending: Vec::new(),
            position: 0,
            timeout: None,
        }
    }

    /// Pump `reader` from a `link_rx` thread. With `realtime` set to
    /// `(frames, rate)`, the pump asks for audio thread priority first.
    pub fn from_reader<R>(mut reader: R, realtime: Option<(u32, u32)>) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (chunk_tx, chunk_rx) = bounded(CHUNK_QUEUE_DEPTH);
        let (error_tx, error_rx) = bounded(1);

        thread::Builder::new()
            .name("link_rx".into())
            .spawn(move || {
                if let Some((frames, rate)) = realtime {
                    if let Err(e) = promote_current_thread_to_real_time(frames, rate) {
                        warn!("link_rx: staying at normal priority: {:?}", e);
                    }
                }

                let mut buf = vec![0u8; READ_CHUNK_LEN];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            debug!("link_rx: end of input");
                            break;
                        },
                        Ok(n) => {
                            if chunk_tx.send(buf[..n].to_vec()).is_err() {
                                debug!("link_rx: receiver gone");
                                break;
                            }
                        },
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("link_rx: read failed: {}", e);
                            let _ = error_tx.send(e);
                            break;
                        },
                    }
                }
            })?;

        Ok(Self::with_errors(chunk_rx, error_rx))
    }

    /// Fail blocking reads that see no byte for `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            sender: self.cancel_tx.clone(),
        }
    }

    fn available(&self) -> &[u8] {
        &self.pending[self.position..]
    }

    fn closed(&self) -> RxError {
        match self.errors.try_recv() {
            Ok(e) => RxError::Io(e),
            Err(_) => io::Error::new(io::ErrorKind::UnexpectedEof, "link closed").into(),
        }
    }

    fn next_chunk(&mut self) -> Result<()> {
        // A pending cancel goes ahead of chunks that are ready.
        if self.cancel_rx.try_recv().is_ok() {
            return Err(RxError::Cancelled);
        }

        let deadline = match self.timeout {
            Some(timeout) => after(timeout),
            None => never::<Instant>(),
        };

        select! {
            recv(self.cancel_rx) -> _ => Err(RxError::Cancelled),
            recv(self.chunks) -> chunk => match chunk {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.position = 0;
                    Ok(())
                },
                Err(_) => Err(self.closed()),
            },
            recv(deadline) -> _ => Err(RxError::Timeout(self.timeout.unwrap_or_default())),
        }
    }
}

impl ByteSource for LinkSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.available().is_empty() {
                self.next_chunk()?;
                continue;
            }
            let n = self.available().len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.available()[..n]);
            self.position += n;
            filled += n;
        }
        Ok(())
    }

    fn discard_buffered(&mut self, max: usize) -> Result<usize> {
        let mut discarded = 0;
        loop {
            let n = self.available().len().min(max - discarded);
            self.position += n;
            discarded += n;
            if discarded == max {
                break;
            }
            match self.chunks.try_recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.position = 0;
                },
                Err(_) => break,
            }
        }
        Ok(discarded)
    }
}

/// Aborts whatever blocking read the paired source is in, or the next one.
#[derive(Clone)]
pub struct Canceller {
    sender: Sender<()>,
}

impl Canceller {
    pub fn cancel(&self) {
        // A cancel already pending is as good as a second one.
        let _ = self.sender.try_send(());
    }
}
