use tracing::trace;

use crate::stream::{Beat, Source};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PackagerState {
    Data,
    Sync,
}

/// Appends the sync word after every payload group.
///
/// Data bytes pass through untouched; there is no escaping. The host finds
/// frames by the marker turning up every `packet_len` bytes.
pub struct Packager<S> {
    sink: S,
    syncword: u8,
    state: PackagerState,
}

impl<S: Source<Item = Beat>> Packager<S> {
    pub fn new(sink: S, syncword: u8) -> Self {
        Self {
            sink,
            syncword,
            state: PackagerState::Data,
        }
    }

    pub fn state(&self) -> PackagerState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: Source<Item = Beat>> Source for Packager<S> {
    type Item = u8;

    fn peek(&mut self) -> Option<u8> {
        match self.state {
            PackagerState::Data => self.sink.peek().map(|beat| beat.data),
            PackagerState::Sync => Some(self.syncword),
        }
    }

    fn ack(&mut self) {
        match self.state {
            PackagerState::Data => {
                if let Some(beat) = self.sink.peek() {
                    self.sink.ack();
                    if beat.eop {
                        trace!("packager: end of payload");
                        self.state = PackagerState::Sync;
                    }
                }
            },
            PackagerState::Sync => {
                self.state = PackagerState::Data;
            },
        }
    }

    fn is_idle(&self) -> bool {
        self.state == PackagerState::Data && self.sink.is_idle()
    }
}
