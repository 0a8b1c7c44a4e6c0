//! Bit-level view of the ADC's serial output, for driving the decoder.

/// Levels on `din` and `wck` at one bit-clock edge.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Edge {
    pub data: bool,
    pub wck: bool,
}

impl Edge {
    pub fn new(data: bool, wck: bool) -> Self {
        Self {
            data,
            wck,
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }
}

/// Turn frames of words into bit-clock edges.
///
/// Each word goes out MSB first in `n_bits` edges, `wck` high on the first
/// edge of every frame. `gap_bits` idle edges follow each frame.
pub fn serialize_frames<I>(frames: I, n_bits: u32, gap_bits: usize) -> impl Iterator<Item = Edge>
where
    I: IntoIterator<Item = Vec<u32>>,
{
    assert!((1..=32).contains(&n_bits), "n_bits in 1..=32");

    frames.into_iter().flat_map(move |frame| {
        let bits = frame.into_iter().enumerate().flat_map(move |(index, word)| {
            (0..n_bits).rev().map(move |bit| {
                Edge::new((word >> bit) & 1 != 0, index == 0 && bit == n_bits - 1)
            })
        });
        bits.chain(std::iter::repeat(Edge::idle()).take(gap_bits))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoder, Word};

    #[test]
    fn strobe_on_first_bit_only() {
        let edges: Vec<Edge> = serialize_frames(vec![vec![0b101, 0b010]], 3, 2).collect();
        assert_eq!(edges, [
            Edge::new(true, true), Edge::new(false, false), Edge::new(true, false),
            Edge::new(false, false), Edge::new(true, false), Edge::new(false, false),
            Edge::idle(), Edge::idle(),
        ]);
    }

    #[test]
    fn decodes_back_through_decoder() {
        let frames = vec![
            vec![0x123456, 0xfedcba, 0x000001],
            vec![0x7fffff, 0x800000, 0xffffff],
        ];
        let mut dut = Decoder::new(24, 3);

        let words: Vec<Word> = serialize_frames(frames.clone(), 24, 5)
            .filter_map(|edge| dut.clock(edge.data, edge.wck))
            .collect();

        let expected: Vec<Word> = frames.iter()
            .flat_map(|frame| frame.iter().enumerate().map(|(i, &w)| Word::new(w, i == 2)))
            .collect();
        assert_eq!(words, expected);
    }
}
