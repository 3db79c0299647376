//! Fractal Brownian motion height field in block units.
//!
//! Sums several octaves of simplex noise; each octave doubles the
//! frequency and halves the amplitude of the previous one.

use noise::{NoiseFn, Simplex};

/// Shape of the height field.
#[derive(Clone, Debug)]
pub struct HeightmapParams {
    pub seed: u64,
    /// Octaves to sum. More octaves add finer bumps.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency of the broadest octave, in cycles per block.
    pub base_frequency: f64,
    /// Amplitude of the broadest octave, in blocks.
    pub amplitude: f64,
    /// Height the noise oscillates around.
    pub base_height: f64,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 5,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.003,
            amplitude: 40.0,
            base_height: 64.0,
        }
    }
}

pub struct HeightmapSampler {
    noise: Simplex,
    params: HeightmapParams,
}

impl HeightmapSampler {
    pub fn new(params: HeightmapParams) -> Self {
        let noise = Simplex::new(params.seed as u32);
        Self { noise, params }
    }

    /// Raw fBm value around zero, within `±max_amplitude()`.
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            total += self.noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total
    }

    /// Surface Y of the block column at `(x, z)`.
    pub fn surface_height(&self, x: i64, z: i64) -> i32 {
        (self.params.base_height + self.sample(x as f64, z as f64)).floor() as i32
    }

    /// Geometric sum of all octave amplitudes.
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp;
            amp *= self.params.persistence;
        }
        sum
    }

    pub fn params(&self) -> &HeightmapParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_same_seed_same_height() {
        let params = HeightmapParams {
            seed: 42,
            ..Default::default()
        };
        let a = HeightmapSampler::new(params.clone());
        let b = HeightmapSampler::new(params);
        for i in 0..50 {
            let x = i * 37;
            let z = -i * 11;
            assert_eq!(a.surface_height(x, z), b.surface_height(x, z));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = HeightmapSampler::new(HeightmapParams {
            seed: 1,
            ..Default::default()
        });
        let b = HeightmapSampler::new(HeightmapParams {
            seed: 999,
            ..Default::default()
        });
        let differs = (0..64).any(|i| {
            let x = i as f64 * 13.0;
            (a.sample(x, 7.0) - b.sample(x, 7.0)).abs() > EPSILON
        });
        assert!(differs, "different seeds should not produce the same field");
    }

    #[test]
    fn test_surface_stays_near_base_height() {
        let sampler = HeightmapSampler::new(HeightmapParams::default());
        let max = sampler.max_amplitude();
        for x in (0..64).map(|i| i * 50) {
            for z in (0..64).map(|i| i * 50) {
                let h = sampler.surface_height(x, z) as f64;
                assert!(
                    (h - 64.0).abs() <= max + 1.0,
                    "height {h} strays past the amplitude bound {max} at ({x}, {z})"
                );
            }
        }
    }

    #[test]
    fn test_max_amplitude_calculation() {
        let sampler = HeightmapSampler::new(HeightmapParams {
            amplitude: 32.0,
            persistence: 0.5,
            octaves: 3,
            ..Default::default()
        });
        assert!((sampler.max_amplitude() - 56.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_amplitude_is_flat() {
        let sampler = HeightmapSampler::new(HeightmapParams {
            amplitude: 0.0,
            ..Default::default()
        });
        assert_eq!(sampler.surface_height(123, -456), 64);
    }
}
