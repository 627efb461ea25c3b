//! Seeded sampling for emission: uniform, approximate Gaussian, and sphere directions

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper half of the standard normal inverse CDF, sampled at 21 evenly
/// spaced probabilities from 0.5 to 1.0 (the last entry clips the tail).
const INV_CDF_TABLE: [f64; 21] = [
    0.00000, 0.06275, 0.125641, 0.18900, 0.253333, 0.318684, 0.385405, 0.453889, 0.524412,
    0.597647, 0.674375, 0.755333, 0.841482, 0.934615, 1.03652, 1.15048, 1.28167, 1.43933,
    1.64500, 1.96000, 3.87000,
];
const TABLE_LAST: usize = INV_CDF_TABLE.len() - 1;
/// Table positions per unit of the half-range uniform deviate
const TABLE_SCALE: f64 = 40.0;

/// Random sampler threaded explicitly through everything that spawns particles.
///
/// Deterministic for a given seed. The underlying generator is pluggable so
/// tests can drive it with any `rand::Rng`.
pub struct RandomSource<R = StdRng> {
    rng: R,
}

impl RandomSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandomSource<R> {
    pub fn from_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Returns a float in [min, max)
    pub fn uniform(&mut self, min: f32, max: f32) -> f32 {
        min + self.rng.gen::<f32>() * (max - min)
    }

    /// Approximate normal deviate by piecewise-linear interpolation of the
    /// inverse CDF table, with a fair coin choosing the sign.
    pub fn gaussian(&mut self, mean: f32, std_dev: f32) -> f32 {
        let mut u = self.rng.gen::<f64>();
        let negative = if u >= 0.5 {
            u -= 0.5;
            false
        } else {
            true
        };

        let position = TABLE_SCALE * u;
        let index = position as usize;
        let delta = if index >= TABLE_LAST {
            INV_CDF_TABLE[TABLE_LAST]
        } else {
            let frac = position - index as f64;
            INV_CDF_TABLE[index] + (INV_CDF_TABLE[index + 1] - INV_CDF_TABLE[index]) * frac
        };

        let delta = if negative { -delta } else { delta };
        (mean as f64 + std_dev as f64 * delta) as f32
    }

    /// Direction uniformly distributed over the unit sphere.
    ///
    /// Cylindrical equal-area projection: uniform azimuth and uniform height
    /// give uniform area density, so there is no clustering at the poles.
    pub fn unit_sphere_direction(&mut self) -> Vec3 {
        let theta = self.uniform(-std::f32::consts::PI, std::f32::consts::PI);
        let y = self.uniform(-1.0, 1.0);
        let r = (1.0 - y * y).max(0.0).sqrt();
        Vec3::new(r * theta.cos(), y, -r * theta.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn uniform_range_bounds() {
        let mut rng = RandomSource::seeded(42);
        for _ in 0..10_000 {
            let v = rng.uniform(-3.0, 10.0);
            assert!((-3.0..10.0).contains(&v));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomSource::seeded(7);
        let mut b = RandomSource::seeded(7);
        for _ in 0..100 {
            assert_eq!(a.gaussian(1.0, 2.0), b.gaussian(1.0, 2.0));
            assert_eq!(a.unit_sphere_direction(), b.unit_sphere_direction());
        }
    }

    #[test]
    fn wraps_any_generator() {
        let mut wrapped = RandomSource::from_rng(StdRng::seed_from_u64(7));
        let mut seeded = RandomSource::seeded(7);
        for _ in 0..100 {
            assert_eq!(wrapped.uniform(0.0, 1.0), seeded.uniform(0.0, 1.0));
        }

        // A constant generator always lands on the same table entry
        let mut stuck = RandomSource::from_rng(StepRng::new(0, 0));
        assert_eq!(stuck.uniform(2.0, 5.0), 2.0);
        assert_eq!(stuck.gaussian(1.0, 1.0), 1.0);
        assert_eq!(stuck.unit_sphere_direction(), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn gaussian_zero_spread_is_mean() {
        let mut rng = RandomSource::seeded(3);
        for _ in 0..100 {
            assert_eq!(rng.gaussian(4.5, 0.0), 4.5);
        }
    }

    #[test]
    fn gaussian_sample_moments() {
        let mut rng = RandomSource::seeded(1234);
        let n = 100_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.gaussian(5.0, 2.0) as f64).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let sd = var.sqrt();

        assert!((mean - 5.0).abs() < 0.05, "mean = {mean}");
        // The clipped tail segment of the table widens the spread by a few percent
        assert!((sd / 2.0 - 1.0).abs() < 0.1, "sd = {sd}");

        let within_one_sd = samples.iter().filter(|s| (**s - 5.0).abs() < 2.0).count();
        let frac = within_one_sd as f64 / n as f64;
        assert!((frac - 0.6827).abs() < 0.02, "fraction within 1 sd = {frac}");
    }

    #[test]
    fn gaussian_is_bounded_by_table() {
        let mut rng = RandomSource::seeded(99);
        for _ in 0..50_000 {
            let g = rng.gaussian(0.0, 1.0);
            assert!(g.abs() <= 3.87 + 1e-5);
        }
    }

    #[test]
    fn sphere_direction_unit_length() {
        let mut rng = RandomSource::seeded(123);
        for _ in 0..1000 {
            let d = rng.unit_sphere_direction();
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn sphere_directions_are_uniform() {
        let mut rng = RandomSource::seeded(2024);
        let n = 100_000;
        let buckets = 20;
        let mut histogram = vec![0usize; buckets];
        let mut sum = Vec3::ZERO;

        for _ in 0..n {
            let d = rng.unit_sphere_direction();
            sum += d;
            let b = (((d.y + 1.0) * 0.5) * buckets as f32) as usize;
            histogram[b.min(buckets - 1)] += 1;
        }

        let mean = sum / n as f32;
        assert!(mean.length() < 0.02, "mean direction = {mean:?}");

        // Equal-area sampling makes height uniform; pole clustering would
        // overfill the outer buckets.
        let expected = n as f64 / buckets as f64;
        for (i, &count) in histogram.iter().enumerate() {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.06, "bucket {i}: {count} vs {expected}");
        }
    }
}
