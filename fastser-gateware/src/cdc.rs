use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ringbuf::{RingBuffer, Consumer, Producer};
use tracing::error;

use crate::decoder::Word;
use crate::stream::{Beat, Source};
use crate::{GatewareError, Result};

/// Build the clock-domain crossing FIFO.
///
/// The writer lives in the bit-clock domain, the reader in the system domain.
/// Words cross whole; the reader cuts them into `bytes_per_word` bytes, most
/// significant first.
pub fn fifo(capacity: usize, bytes_per_word: usize) -> (FifoWriter, FifoReader) {
    assert!(capacity > 0, "capacity > 0");
    assert!((1..=4).contains(&bytes_per_word), "bytes_per_word in 1..=4");

    let (producer, consumer) = RingBuffer::<Word>::new(capacity).split();
    let fault = Arc::new(AtomicBool::new(false));

    let writer = FifoWriter {
        producer,
        capacity,
        fault: fault.clone(),
    };
    let reader = FifoReader {
        consumer,
        fault,
        bytes_per_word,
        staged: None,
        byte: 0,
    };

    (writer, reader)
}

pub struct FifoWriter {
    producer: Producer<Word>,
    capacity: usize,
    fault: Arc<AtomicBool>,
}

impl FifoWriter {
    /// Enqueue a word. A full FIFO is an overrun: the fault flag goes up
    /// and the word is lost.
    pub fn push(&mut self, word: Word) -> Result<()> {
        if self.producer.push(word).is_err() {
            self.fault.store(true, Ordering::Release);
            error!(capacity = self.capacity, "cdc fifo overrun");
            return Err(GatewareError::Overrun { capacity: self.capacity });
        }
        Ok(())
    }

    /// Words waiting for the system domain.
    pub fn queued(&self) -> usize {
        self.producer.len()
    }
}

pub struct FifoReader {
    consumer: Consumer<Word>,
    fault: Arc<AtomicBool>,
    bytes_per_word: usize,

    /// Word being cut into bytes, and the index of the next byte.
    staged: Option<Word>,
    byte: usize,
}

impl FifoReader {
    /// The writer side overran at some point.
    pub fn overrun(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    fn stage(&mut self) -> Option<Word> {
        if self.staged.is_none() {
            self.staged = self.consumer.pop();
            self.byte = 0;
        }
        self.staged
    }
}

impl Source for FifoReader {
    type Item = Beat;

    fn peek(&mut self) -> Option<Beat> {
        let word = self.stage()?;
        let shift = 8 * (self.bytes_per_word - 1 - self.byte);
        let last = self.byte + 1 == self.bytes_per_word;
        Some(Beat::new((word.data >> shift) as u8, word.eop && last))
    }

    fn ack(&mut self) {
        if self.staged.is_none() {
            return;
        }
        self.byte += 1;
        if self.byte == self.bytes_per_word {
            self.staged = None;
            self.byte = 0;
        }
    }

    fn is_idle(&self) -> bool {
        self.staged.is_none() && self.consumer.is_empty()
    }
}
