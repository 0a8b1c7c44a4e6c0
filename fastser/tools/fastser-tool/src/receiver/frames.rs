use std::slice::ChunksExact;

/// Decoded samples, `channels` per frame, frame after frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleFrames {
    channels: usize,
    samples: Vec<i32>,
}

impl SampleFrames {
    pub fn new(channels: usize, samples: Vec<i32>) -> Self {
        assert!(channels > 0, "channels > 0");
        assert_eq!(samples.len() % channels, 0, "whole frames only");
        Self {
            channels,
            samples,
        }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn frame(&self, index: usize) -> &[i32] {
        &self.samples[index * self.channels..(index + 1) * self.channels]
    }

    pub fn iter(&self) -> ChunksExact<'_, i32> {
        self.samples.chunks_exact(self.channels)
    }

    /// Largest magnitude per channel.
    pub fn peaks(&self) -> Vec<u32> {
        let mut peaks = vec![0u32; self.channels];
        for frame in self.iter() {
            for (peak, sample) in peaks.iter_mut().zip(frame) {
                *peak = (*peak).max(sample.unsigned_abs());
            }
        }
        peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_major_layout() {
        let frames = SampleFrames::new(3, vec![1, 2, 3, -4, 5, -6]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.frame(1), [-4, 5, -6]);
        assert_eq!(frames.iter().next(), Some(&[1, 2, 3][..]));
        assert_eq!(frames.peaks(), [4, 5, 6]);
    }

    #[test]
    fn peak_of_most_negative() {
        let frames = SampleFrames::new(1, vec![-8388608, 8388607]);
        assert_eq!(frames.peaks(), [8388608]);
    }

    #[test]
    #[should_panic(expected = "whole frames only")]
    fn ragged_rejected() {
        let _ = SampleFrames::new(7, vec![0; 8]);
    }
}
