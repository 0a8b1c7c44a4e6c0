use crate::stream::Source;

/// Payload periods per character: 8 data bits then the port bit.
pub const CHARACTER_BITS: u8 = 9;

/// Line periods one character occupies, start bit included.
pub const CHARACTER_PERIODS: usize = 1 + CHARACTER_BITS as usize;

/// One character as seen on the wire.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Character {
    pub data: u8,
    pub port: bool,
}

impl Character {
    pub fn new(data: u8, port: bool) -> Self {
        Self {
            data,
            port,
        }
    }
}

/// Transmitter for FTDI "fast" clocked serial.
///
/// The line is driven on every edge of the shared clock. A start bit (low)
/// is followed by the data bits LSB first and then the port bit; the line
/// idles high. `cts` is only looked at when idle, so a character that has
/// started always finishes.
///
/// The byte stays presented upstream while it is on the line and is
/// acknowledged on the edge that sends its port bit.
///
pub struct FastSerialTx {
    tx_reg: u16,
    tx_bit: u8,
    port: bool,
    di: bool,
}

impl FastSerialTx {
    pub fn new(port: bool) -> Self {
        Self {
            tx_reg: 0,
            tx_bit: 0,
            port,
            di: true,
        }
    }

    /// Port bit for characters loaded from now on.
    pub fn set_port(&mut self, port: bool) {
        self.port = port;
    }

    pub fn port(&self) -> bool {
        self.port
    }

    /// No character in flight.
    pub fn is_idle(&self) -> bool {
        self.tx_bit == 0
    }

    /// Advance one edge and return the line level for it.
    pub fn clock<S: Source<Item = u8>>(&mut self, source: &mut S, cts: bool) -> bool {
        if self.tx_bit > 0 {
            self.di = self.tx_reg & 1 != 0;
            self.tx_reg >>= 1;
            self.tx_bit -= 1;
            if self.tx_bit == 0 {
                source.ack();
            }
            return self.di;
        }

        let byte = if cts { source.peek() } else { None };
        match byte {
            Some(byte) => {
                self.tx_reg = u16::from(byte) | u16::from(self.port) << 8;
                self.tx_bit = CHARACTER_BITS;
                self.di = false;
            },
            None => {
                self.di = true;
            },
        }
        self.di
    }
}

/// The other end of the line: what the host's serial adapter does.
#[derive(Default)]
pub struct FastSerialRx {
    shift: u16,
    remaining: u8,
}

impl FastSerialRx {
    pub fn new() -> Self {
        Self::default()
    }

    /// In the middle of a character.
    pub fn is_busy(&self) -> bool {
        self.remaining > 0
    }

    /// Sample the line on one edge.
    pub fn clock(&mut self, line: bool) -> Option<Character> {
        if self.remaining == 0 {
            if !line {
                self.shift = 0;
                self.remaining = CHARACTER_BITS;
            }
            return None;
        }

        let index = CHARACTER_BITS - self.remaining;
        self.shift |= u16::from(line) << index;
        self.remaining -= 1;

        if self.remaining == 0 {
            Some(Character::new(self.shift as u8, self.shift & 0x100 != 0))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn waits_for_cts_then_sends() {
        let mut tx = FastSerialTx::new(false);
        let mut rx = FastSerialRx::new();
        let mut source: VecDeque<u8> = [0b0101_0101, 0x00].into();

        let mut line = Vec::new();
        let mut received = Vec::new();
        for edge in 0..40 {
            let cts = edge >= 5;
            let level = tx.clock(&mut source, cts);
            // The port bit was latched with the first byte; the second goes out with port 1.
            if !tx.is_idle() && !tx.port() {
                tx.set_port(true);
            }
            line.push(level);
            received.extend(rx.clock(level));
        }

        assert!(line[..5].iter().all(|&l| l), "idle high while cts is low");
        assert!(!line[5], "start bit as soon as cts rises");
        assert_eq!(received, [Character::new(0x55, false), Character::new(0x00, true)]);
        assert!(line[25..].iter().all(|&l| l), "idle high afterwards");
    }

    #[test]
    fn character_bit_order() {
        let mut tx = FastSerialTx::new(true);
        let mut source: VecDeque<u8> = [0b1100_1010].into();

        let line: Vec<bool> = (0..12).map(|_| tx.clock(&mut source, true)).collect();
        let expected = [
            false,
            false, true, false, true, false, false, true, true,
            true,
            true, true,
        ];
        assert_eq!(line, expected);
    }

    #[test]
    fn back_to_back_without_gap() {
        let bytes: Vec<u8> = (0..16).map(|i| i * 17).collect();
        let mut source: VecDeque<u8> = bytes.iter().copied().collect();
        let mut tx = FastSerialTx::new(true);
        let mut rx = FastSerialRx::new();

        let mut starts = Vec::new();
        let mut received = Vec::new();
        for edge in 0..bytes.len() * CHARACTER_PERIODS {
            let was_idle = tx.is_idle();
            let level = tx.clock(&mut source, true);
            if was_idle && !level {
                starts.push(edge);
            }
            received.extend(rx.clock(level));
        }

        let expected: Vec<usize> = (0..bytes.len()).map(|i| i * CHARACTER_PERIODS).collect();
        assert_eq!(starts, expected);
        assert_eq!(received.iter().map(|c| c.data).collect::<Vec<_>>(), bytes);
        assert!(tx.is_idle());
        assert!(source.is_empty());
    }

    #[test]
    fn cts_drop_mid_character_ignored() {
        let mut tx = FastSerialTx::new(false);
        let mut rx = FastSerialRx::new();
        let mut source: VecDeque<u8> = [0xa5, 0x3c].into();

        let mut received = Vec::new();
        for edge in 0..30 {
            let cts = edge == 0;
            received.extend(rx.clock(tx.clock(&mut source, cts)));
        }

        assert_eq!(received, [Character::new(0xa5, false)]);
        assert_eq!(source.len(), 1, "second byte not taken without cts");
    }

    #[test]
    fn byte_held_upstream_until_port_bit() {
        let mut tx = FastSerialTx::new(true);
        let mut source: VecDeque<u8> = [0x12, 0x34].into();

        let queued: Vec<usize> = (0..CHARACTER_PERIODS * 2)
            .map(|_| {
                tx.clock(&mut source, true);
                source.len()
            })
            .collect();

        let mut expected = vec![2; CHARACTER_PERIODS - 1];
        expected.push(1);
        expected.extend(vec![1; CHARACTER_PERIODS - 1]);
        expected.push(0);
        assert_eq!(queued, expected);
        assert!(tx.is_idle());
    }

    #[test]
    fn no_data_idles_high() {
        let mut tx = FastSerialTx::new(true);
        let mut source: VecDeque<u8> = VecDeque::new();
        for _ in 0..20 {
            assert!(tx.clock(&mut source, true));
        }
        assert!(tx.is_idle());
    }
}
