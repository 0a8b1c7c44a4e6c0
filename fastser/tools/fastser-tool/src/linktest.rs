use console::{style, Color};
use fastser_gateware::pattern::{CounterPattern, PATTERN_LEN};
use tracing::{info, warn};

use crate::receiver::{ByteSource, Receiver, ReceiverConfig, Result};

const BATCH: usize = 256;

/// Frame layout of the counter test pattern.
pub fn counter_layout(base: &ReceiverConfig) -> ReceiverConfig {
    ReceiverConfig {
        channels: PATTERN_LEN,
        bytes_per_sample: 1,
        ..base.clone()
    }
}

/// Does one decoded packet carry the expected count?
pub fn counter_packet_ok(frame: &[i32]) -> bool {
    frame.len() == PATTERN_LEN && frame.iter().map(|&s| s as u8).eq(CounterPattern::payload())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkTestReport {
    pub packets: usize,
    pub bad: usize,
    /// Index of the first bad packet.
    pub first_bad: Option<usize>,
}

impl LinkTestReport {
    pub fn check(&mut self, frame: &[i32]) {
        if !counter_packet_ok(frame) {
            if self.first_bad.is_none() {
                warn!(packet = self.packets, "linktest: bad payload {:?}", frame);
                self.first_bad = Some(self.packets);
            }
            self.bad += 1;
        }
        self.packets += 1;
    }

    pub fn passed(&self) -> bool {
        self.bad == 0 && self.packets > 0
    }

    pub fn print(&self) {
        let verdict = if self.passed() {
            style("PASS").fg(Color::Green)
        } else {
            style("FAIL").fg(Color::Red)
        };
        match self.first_bad {
            Some(first) => eprintln!("linktest: [{}] {} packets, {} bad, first bad packet {}",
                verdict, self.packets, self.bad, first),
            None => eprintln!("linktest: [{}] {} packets, {} bad", verdict, self.packets, self.bad),
        }
    }
}

/// Sync to the counter pattern and check `packets` packets.
///
/// Losing sync fails the test outright.
pub fn linktest<S: ByteSource>(rx: &mut Receiver<S>, packets: usize) -> Result<LinkTestReport> {
    rx.sync()?;
    info!(packets, "linktest: synchronized");

    let mut report = LinkTestReport::default();
    while report.packets < packets {
        let n = (packets - report.packets).min(BATCH);
        let frames = rx.read(n)?;
        for frame in frames.iter() {
            report.check(frame);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::{LinkSource, RxError};
    use crossbeam::channel::unbounded;
    use std::time::Duration;

    fn counter_stream(packets: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..packets {
            out.extend(CounterPattern::payload());
            out.push(0x47);
        }
        out
    }

    fn receiver(stream: Vec<u8>) -> Receiver<LinkSource> {
        let (tx, chunks) = unbounded();
        tx.send(stream).unwrap();
        let source = LinkSource::new(chunks).with_timeout(Duration::from_millis(50));
        let config = counter_layout(&ReceiverConfig { flush_len: 0, ..ReceiverConfig::default() });
        Receiver::new(source, config).unwrap()
    }

    #[test]
    fn clean_pattern_passes() {
        // Join mid-packet, as a real capture would.
        let stream = counter_stream(301)[5..].to_vec();
        let mut rx = receiver(stream);

        let report = linktest(&mut rx, 300).unwrap();
        assert_eq!(report, LinkTestReport { packets: 300, bad: 0, first_bad: None });
        assert!(report.passed());
    }

    #[test]
    fn corrupted_byte_reported() {
        let mut stream = counter_stream(5);
        stream[33 * 3 + 7] ^= 0x10;
        let mut rx = receiver(stream);

        let report = linktest(&mut rx, 4).unwrap();
        assert_eq!(report.bad, 1);
        assert_eq!(report.first_bad, Some(2));
        assert!(!report.passed());
    }

    #[test]
    fn dropped_byte_is_lost_sync() {
        let mut stream = counter_stream(5);
        stream.remove(33 * 2 + 4);
        let mut rx = receiver(stream);

        assert!(matches!(linktest(&mut rx, 3), Err(RxError::LostSync { frame: 1, .. })));
    }

    #[test]
    fn packet_check() {
        let good: Vec<i32> = (0..32).collect();
        assert!(counter_packet_ok(&good));
        assert!(!counter_packet_ok(&good[..31]));

        let mut shifted = good.clone();
        shifted.rotate_left(1);
        assert!(!counter_packet_ok(&shifted));
    }
}
