//! Uniform random source used for spawning.

use rand::Rng;

/// Draws uniformly distributed floats.
pub trait UniformSource {
    /// A value in `[from, to)`. Returns `from` when the range is empty.
    fn uniform(&mut self, from: f32, to: f32) -> f32;
}

impl<R: Rng + ?Sized> UniformSource for R {
    fn uniform(&mut self, from: f32, to: f32) -> f32 {
        if to > from {
            self.gen_range(from..to)
        } else {
            from
        }
    }
}
