use std::io::Write;

use crate::receiver::{ByteSource, Receiver, Result, SampleFrames};

/// Sync, read `nframes` frames and write one row per frame.
pub fn dump<S: ByteSource, W: Write>(rx: &mut Receiver<S>, nframes: usize, hex: bool, out: &mut W) -> Result<SampleFrames> {
    rx.sync()?;
    let frames = rx.read(nframes)?;
    write_frames(&frames, rx.config().bytes_per_sample, hex, out)?;
    Ok(frames)
}

pub fn write_frames<W: Write>(frames: &SampleFrames, nbytes: usize, hex: bool, out: &mut W) -> std::io::Result<()> {
    let digits = nbytes * 2;
    let mask = if nbytes == 4 { u32::MAX } else { (1u32 << (8 * nbytes)) - 1 };

    for (index, frame) in frames.iter().enumerate() {
        write!(out, "{index:6}:")?;
        for &sample in frame {
            if hex {
                write!(out, " {:0width$x}", sample as u32 & mask, width = digits)?;
            } else {
                write!(out, " {sample:9}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
