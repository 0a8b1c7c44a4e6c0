use crate::stream::{Beat, Source};

/// Bytes per counter packet.
pub const PATTERN_LEN: usize = 32;

/// Link test pattern: bytes 0 through 31, end of payload on 31, repeated.
///
/// Feeds the packager directly so the serial link can be checked without
/// an ADC attached.
pub struct CounterPattern {
    counter: u8,
    remaining: Option<u64>,
}

impl CounterPattern {
    /// Runs forever.
    pub fn new() -> Self {
        Self {
            counter: 0,
            remaining: None,
        }
    }

    /// Stops after `packets` complete packets.
    pub fn with_packets(packets: u64) -> Self {
        Self {
            counter: 0,
            remaining: Some(packets),
        }
    }

    /// Payload of every packet.
    pub fn payload() -> impl Iterator<Item = u8> {
        0..PATTERN_LEN as u8
    }
}

impl Default for CounterPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for CounterPattern {
    type Item = Beat;

    fn peek(&mut self) -> Option<Beat> {
        if self.remaining == Some(0) {
            return None;
        }
        Some(Beat::new(self.counter, usize::from(self.counter) == PATTERN_LEN - 1))
    }

    fn ack(&mut self) {
        match self.remaining {
            Some(0) => return,
            Some(ref mut n) if usize::from(self.counter) == PATTERN_LEN - 1 => *n -= 1,
            _ => {},
        }
        self.counter = (self.counter + 1) % PATTERN_LEN as u8;
    }

    fn is_idle(&self) -> bool {
        self.remaining == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::Packager;

    #[test]
    fn packets_through_packager() {
        let mut dut = Packager::new(CounterPattern::with_packets(3), 0x47);

        let mut out = Vec::new();
        while let Some(byte) = dut.peek() {
            dut.ack();
            out.push(byte);
        }

        let mut expected = Vec::new();
        for _ in 0..3 {
            expected.extend(CounterPattern::payload());
            expected.push(0x47);
        }
        assert_eq!(out, expected);
        assert!(dut.is_idle());
    }

    #[test]
    fn endless_pattern_wraps() {
        let mut dut = CounterPattern::new();
        let mut last_eop = 0;
        for i in 0..1000usize {
            let beat = dut.peek().unwrap();
            assert_eq!(usize::from(beat.data), i % PATTERN_LEN);
            if beat.eop {
                last_eop = i;
            }
            dut.ack();
        }
        assert_eq!(last_eop, 991);
        assert!(!dut.is_idle());
    }

    #[test]
    fn zero_packets_is_idle() {
        let mut dut = CounterPattern::with_packets(0);
        assert!(dut.is_idle());
        assert_eq!(dut.peek(), None);
    }
}
