/// A test signal, one sample per `advance()`.
pub trait ToneGenerator {
    /// Latest sample, in -1.0..=1.0.
    fn output(&self) -> f32;
    fn advance(&mut self);
}

pub mod tone;
