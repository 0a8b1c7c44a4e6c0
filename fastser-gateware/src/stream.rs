use std::collections::VecDeque;

/// One byte of payload on its way to the packager.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Beat {
    pub data: u8,
    /// Last byte of a payload group.
    pub eop: bool,
}

impl Beat {
    pub fn new(data: u8, eop: bool) -> Self {
        Self {
            data,
            eop,
        }
    }
}

/// Strobe/acknowledge handshake, seen from the consuming end.
///
/// `peek()` is strobe plus payload: `Some` while the producer presents an
/// item. `ack()` completes the transfer of that item and is only valid right
/// after a `peek()` that returned `Some`. Peeking without acknowledging is
/// backpressure; the same item is presented again next time.
///
pub trait Source {
    type Item;

    fn peek(&mut self) -> Option<Self::Item>;
    fn ack(&mut self);

    /// Nothing presented now, nor anything held back internally.
    fn is_idle(&self) -> bool;
}

impl<T: Copy> Source for VecDeque<T> {
    type Item = T;

    fn peek(&mut self) -> Option<T> {
        self.front().copied()
    }

    fn ack(&mut self) {
        self.pop_front();
    }

    fn is_idle(&self) -> bool {
        self.is_empty()
    }
}
