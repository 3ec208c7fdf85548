//! Random sources for the roll engine. Everything that draws takes a
//! `rand::Rng`, so callers pick the generator: entropy-seeded for play,
//! a fixed seed for replays, or a scripted sequence for tests.
use crate::error::{GachaError, Result};
use rand::{Error, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generator with a fixed seed. ChaCha keeps sequences stable across platforms.
pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn from_entropy() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

/// Seeded when a seed is configured, entropy otherwise.
pub fn for_seed(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => seeded(seed),
        None => from_entropy(),
    }
}

/// Replays a fixed list of unit draws, cycling when exhausted.
///
/// Each value in `[0, 1)` is encoded so that `rng.gen::<f64>()` returns it,
/// rounded up to the next multiple of 2^-53, so a forced draw never lands
/// below the value asked for.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    pub fn new(draws: impl Into<Vec<f64>>) -> Result<Self> {
        let draws = draws.into();
        if draws.is_empty() {
            return Err(GachaError::InvalidAmount("scripted rng needs at least one draw".to_string()));
        }
        Ok(Self { draws, cursor: 0 })
    }

    /// Same draw forever.
    pub fn constant(value: f64) -> Self {
        Self {
            draws: vec![value],
            cursor: 0,
        }
    }

    fn next_draw(&mut self) -> f64 {
        let value = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        value
    }
}

const UNIT_BITS: u32 = 53;
const MAX_UNIT: u64 = (1u64 << UNIT_BITS) - 1;

fn encode_unit(value: f64) -> u64 {
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let mantissa = ((clamped * (1u64 << UNIT_BITS) as f64).ceil() as u64).min(MAX_UNIT);
    mantissa << (64 - UNIT_BITS)
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let draw = self.next_draw();
        encode_unit(draw)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn scripted_draws_come_back_in_order() {
        let mut rng = ScriptedRng::new(vec![0.0009, 0.5, 0.99]).unwrap();
        assert!((rng.gen::<f64>() - 0.0009).abs() < 1e-12);
        assert!((rng.gen::<f64>() - 0.5).abs() < 1e-12);
        assert!((rng.gen::<f64>() - 0.99).abs() < 1e-12);
        // cycles
        assert!((rng.gen::<f64>() - 0.0009).abs() < 1e-12);
    }

    #[test]
    fn scripted_draws_stay_below_one() {
        let mut rng = ScriptedRng::constant(1.0);
        let v: f64 = rng.gen();
        assert!(v < 1.0);
    }

    #[test]
    fn scripted_draws_never_fall_below_the_script() {
        for value in [0.008, 0.0009, 0.1, 0.3, 0.75, 0.995] {
            let v: f64 = ScriptedRng::constant(value).gen();
            assert!(v >= value, "{v} < {value}");
            assert!(v - value < 1e-15);
        }
        assert_eq!(ScriptedRng::constant(0.0).gen::<f64>(), 0.0);
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(matches!(ScriptedRng::new(Vec::new()), Err(GachaError::InvalidAmount(_))));
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = seeded(7);
        let mut b = seeded(7);
        for _ in 0..8 {
            assert_eq!(a.gen::<f64>(), b.gen::<f64>());
        }
    }
}
