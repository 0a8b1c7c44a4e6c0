/// A parallel sample word recovered from the serial line.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Word {
    pub data: u32,
    /// Last word of the frame.
    pub eop: bool,
}

impl Word {
    pub fn new(data: u32, eop: bool) -> Self {
        Self {
            data,
            eop,
        }
    }
}

/// Bit-serial to parallel word decoder, clocked by the ADC bit clock.
///
/// `wck` marks the first bit of a frame of `n_words` words, each `n_bits`
/// wide, MSB first. The bit that arrives with `wck` is already shifted in on
/// that edge, which is why the bit counter reloads with `n_bits - 2` there
/// and with `n_bits - 1` on every later word boundary.
///
/// Once `n_words` words are out, the decoder goes quiet until the next
/// `wck`. A `wck` arriving early restarts the count; the abandoned frame just
/// ends without an `eop` word.
///
pub struct Decoder {
    n_bits: u32,
    n_words: u32,
    mask: u32,

    word: u32,
    bit: u32,
    word_num: u32,
}

impl Decoder {
    pub fn new(n_bits: u32, n_words: u32) -> Self {
        assert!((2..=32).contains(&n_bits), "n_bits in 2..=32");
        assert!(n_words > 0, "n_words > 0");

        let mask = if n_bits == 32 { u32::MAX } else { (1 << n_bits) - 1 };

        Self {
            n_bits,
            n_words,
            mask,
            word: 0,
            bit: 0,
            word_num: 0,
        }
    }

    pub fn n_bits(&self) -> u32 {
        self.n_bits
    }

    /// Words still expected in the current frame.
    pub fn words_remaining(&self) -> u32 {
        self.word_num
    }

    /// Advance one bit-clock edge.
    pub fn clock(&mut self, data: bool, wck: bool) -> Option<Word> {
        self.word = ((self.word << 1) | u32::from(data)) & self.mask;

        if wck {
            self.bit = self.n_bits - 2;
            self.word_num = self.n_words;
            None
        } else if self.bit == 0 && self.word_num > 0 {
            let word = Word::new(self.word, self.word_num == 1);
            self.bit = self.n_bits - 1;
            self.word_num -= 1;
            Some(word)
        } else {
            // Free-runs between frames; the value is never looked at there.
            self.bit = self.bit.checked_sub(1).unwrap_or(self.n_bits - 1);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `None` is one idle edge, `Some` a frame whose first bit carries wck.
    fn feed(dut: &mut Decoder, frames: &[Option<&[u32]>]) -> Vec<Word> {
        let mut out = Vec::new();
        for frame in frames {
            match frame {
                None => out.extend(dut.clock(false, false)),
                Some(words) => {
                    let mut wck = true;
                    for word in words.iter() {
                        for bit in (0..dut.n_bits()).rev() {
                            out.extend(dut.clock((word >> bit) & 1 != 0, wck));
                            wck = false;
                        }
                    }
                },
            }
        }
        out
    }

    #[test]
    fn frames_with_idle_and_long_frames() {
        let frames: [Option<&[u32]>; 12] = [
            None, None, None, None,
            Some(&[0x81, 0xff][..]),
            Some(&[0x00, 0xff][..]),
            None, None, None, None,
            Some(&[0x00, 0xff, 0x81][..]),
            Some(&[0x00, 0xff][..]),
        ];

        let mut dut = Decoder::new(8, 2);
        let out = feed(&mut dut, &frames);

        // The third word of the long frame falls outside the frame and is never emitted.
        let expected = [
            Word::new(0x81, false), Word::new(0xff, true),
            Word::new(0x00, false), Word::new(0xff, true),
            Word::new(0x00, false), Word::new(0xff, true),
            Word::new(0x00, false), Word::new(0xff, true),
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn first_word_includes_bit_sampled_with_wck() {
        // Reload with n_bits - 2 on wck: the strobe edge's bit is the MSB of
        // word 0, and word 0 completes on the n_bits-th edge.
        let mut dut = Decoder::new(8, 1);

        assert_eq!(dut.clock(true, true), None);
        for _ in 0..6 {
            assert_eq!(dut.clock(false, false), None);
        }
        assert_eq!(dut.clock(true, false), Some(Word::new(0x81, true)));
        assert_eq!(dut.words_remaining(), 0);
    }

    #[test]
    fn strobe_on_completion_edge_restarts_frame() {
        // wck only reloads: the word that would have completed on the strobe
        // edge is dropped and that edge's bit opens the new frame.
        let mut dut = Decoder::new(8, 1);

        assert_eq!(dut.clock(false, true), None);
        for _ in 0..6 {
            assert_eq!(dut.clock(false, false), None);
        }
        assert_eq!(dut.clock(true, true), None);
        assert_eq!(dut.words_remaining(), 1);

        let mut out = Vec::new();
        for _ in 0..7 {
            out.extend(dut.clock(true, false));
        }
        assert_eq!(out, [Word::new(0xff, true)]);
    }

    #[test]
    fn words_between_strobes() {
        for n_bits in [2u32, 3, 8, 12, 24] {
            for n_words in [1u32, 3, 5] {
                let max_edges = ((n_words + 2) * n_bits) as usize;
                for edges in 1..=max_edges {
                    let mut dut = Decoder::new(n_bits, n_words);
                    let mut out = Vec::new();
                    for i in 0..edges {
                        out.extend(dut.clock(i % 3 == 0, i == 0));
                    }

                    let expected = (edges / n_bits as usize).min(n_words as usize);
                    assert_eq!(out.len(), expected, "n_bits={n_bits} n_words={n_words} edges={edges}");

                    for (i, word) in out.iter().enumerate() {
                        assert_eq!(word.eop, i + 1 == n_words as usize, "eop position, word {i}");
                    }
                }
            }
        }
    }

    #[test]
    fn early_strobe_truncates_frame() {
        let mut dut = Decoder::new(8, 3);

        // One and a half words, then a new frame.
        let short: [Option<&[u32]>; 1] = [Some(&[0x12][..])];
        let mut out = feed(&mut dut, &short);
        for _ in 0..4 {
            out.extend(dut.clock(true, false));
        }
        let full: [Option<&[u32]>; 1] = [Some(&[0xa5, 0x5a, 0x3c][..])];
        out.extend(feed(&mut dut, &full));

        assert_eq!(out, [
            Word::new(0x12, false),
            Word::new(0xa5, false),
            Word::new(0x5a, false),
            Word::new(0x3c, true),
        ]);
    }

    #[test]
    fn wide_words_are_masked() {
        let mut dut = Decoder::new(24, 2);
        let frames: [Option<&[u32]>; 2] = [
            Some(&[0xffffff, 0x800001][..]),
            Some(&[0x000001, 0x7fffff][..]),
        ];
        let out = feed(&mut dut, &frames);
        let data: Vec<u32> = out.iter().map(|w| w.data).collect();
        assert_eq!(data, [0xffffff, 0x800001, 0x000001, 0x7fffff]);
    }

    #[test]
    #[should_panic(expected = "n_bits in 2..=32")]
    fn one_bit_words_rejected() {
        let _ = Decoder::new(1, 4);
    }

    #[test]
    #[should_panic(expected = "n_words > 0")]
    fn empty_frames_rejected() {
        let _ = Decoder::new(8, 0);
    }
}
