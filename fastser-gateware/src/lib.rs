//! Software model of the capture gateware.
//!
//! The gateware sits between a multi-channel ADC and an FTDI-style "fast"
//! clocked serial port:
//!
//! ```text
//! bck/wck/din -> Decoder -> cdc fifo -> Packager -> FastSerialTx -> line
//! ```
//!
//! Every block is a struct with an explicit `clock()` step. [`link::Link`]
//! runs the bit-clock domain and the system domain on their own threads,
//! joined only by the [`cdc`] ring buffer.

use thiserror::Error;

pub mod cdc;
pub mod decoder;
pub mod fast_serial;
pub mod frontend;
pub mod link;
pub mod packager;
pub mod pattern;
pub mod stream;

pub use cdc::{fifo, FifoReader, FifoWriter};
pub use decoder::{Decoder, Word};
pub use fast_serial::{Character, FastSerialRx, FastSerialTx};
pub use frontend::{serialize_frames, Edge};
pub use link::{Link, LinkConfig, LinkStats};
pub use packager::{Packager, PackagerState};
pub use pattern::CounterPattern;
pub use stream::{Beat, Source};

/// Marker byte following every packet.
pub const SYNCWORD: u8 = 0x47;

#[derive(Error, Debug)]
pub enum GatewareError {
    #[error("cdc fifo overrun, {capacity} words queued")]
    Overrun { capacity: usize },

    #[error("invalid link configuration: {0}")]
    Config(String),

    #[error("{0} domain thread panicked")]
    Panicked(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewareError>;
