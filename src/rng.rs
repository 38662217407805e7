//! C1: the RNG facade.
//!
//! Every stochastic draw in the engine — roulette selection, distribution of
//! initial prevalence, rewiring, mutation, neighbor sampling — routes through
//! one `Rng` value so that a fixed seed reproduces a fixed draw sequence.
//! There is no global/thread-local RNG state anywhere in this crate: a `Model`
//! owns its `Rng`, and a cloned `Model` (for replicate parallelism) owns an
//! independently seeded clone.
//!
//! Built over `rand`/`rand_distr`/`rand_chacha`, the same seeded-PRNG family
//! the teacher already depends on (`rand_chacha` for `ChaCha8Rng`).

use rand::{Rng as _, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Binomial, Distribution, Exp, Gamma, Geometric, LogNormal, Normal, Poisson};

/// A seeded, cloneable pseudo-random source.
///
/// Cloning an `Rng` clones its internal generator state, which is how
/// parallel replicates each get their own independent stream after being
/// re-seeded from a sub-seed drawn from the master `Rng` (see
/// `Model::run_multiple`).
#[derive(Clone, Debug)]
pub struct Rng {
    state: ChaCha8Rng,
}

impl Rng {
    /// Builds a facade seeded deterministically from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Replaces the internal state as if newly constructed with `seed`.
    /// Used by `Model::reset` and by each replicate in `run_multiple`.
    pub fn seed(&mut self, seed: u64) {
        self.state = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Draws a sub-seed from the current stream, consuming entropy from it.
    /// Used to derive one independent sub-seed per replicate from the
    /// top-level master `Rng`.
    pub fn draw_subseed(&mut self) -> u64 {
        self.state.gen()
    }

    /// Uniform draw on `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.state.gen::<f64>()
    }

    /// Uniform draw on `[a, b)`.
    pub fn uniform_range(&mut self, a: f64, b: f64) -> f64 {
        a + (b - a) * self.uniform()
    }

    /// Draw from `Normal(mu, sigma)`.
    pub fn normal(&mut self, mu: f64, sigma: f64) -> f64 {
        Normal::new(mu, sigma)
            .expect("normal distribution requires sigma > 0")
            .sample(&mut self.state)
    }

    /// Draw from `Gamma(shape, scale)`.
    pub fn gamma(&mut self, shape: f64, scale: f64) -> f64 {
        Gamma::new(shape, scale)
            .expect("gamma distribution requires shape > 0 and scale > 0")
            .sample(&mut self.state)
    }

    /// Draw from `LogNormal(mu, sigma)`.
    pub fn lognormal(&mut self, mu: f64, sigma: f64) -> f64 {
        LogNormal::new(mu, sigma)
            .expect("lognormal distribution requires sigma > 0")
            .sample(&mut self.state)
    }

    /// Draw from `Exponential(lambda)`.
    pub fn exponential(&mut self, lambda: f64) -> f64 {
        Exp::new(lambda)
            .expect("exponential distribution requires lambda > 0")
            .sample(&mut self.state)
    }

    /// Draw from `Binomial(n, p)`.
    pub fn binomial(&mut self, n: u64, p: f64) -> u64 {
        Binomial::new(n, p)
            .expect("binomial distribution requires p in [0,1]")
            .sample(&mut self.state)
    }

    /// Draw from `NegativeBinomial(r, p)` (number of failures before the
    /// `r`-th success), implemented as a Gamma-Poisson mixture:
    /// `NB(r, p) ~ Poisson(Gamma(r, (1-p)/p))`.
    pub fn negative_binomial(&mut self, r: f64, p: f64) -> u64 {
        debug_assert!(r > 0.0 && p > 0.0 && p <= 1.0);
        let scale = (1.0 - p) / p;
        let lambda = self.gamma(r, scale);
        self.poisson(lambda.max(0.0))
    }

    /// Draw from `Geometric(p)` (number of failures before the first
    /// success).
    pub fn geometric(&mut self, p: f64) -> u64 {
        Geometric::new(p)
            .expect("geometric distribution requires p in (0,1]")
            .sample(&mut self.state)
    }

    /// Draw from `Poisson(lambda)`.
    pub fn poisson(&mut self, lambda: f64) -> u64 {
        if lambda <= 0.0 {
            return 0;
        }
        Poisson::new(lambda)
            .expect("poisson distribution requires lambda > 0")
            .sample(&mut self.state) as u64
    }

    /// Draws an index in `[0, n)` uniformly, used by the roulette and by
    /// neighbor/rewire sampling.
    pub fn index(&mut self, n: usize) -> usize {
        (self.uniform() * n as f64).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..50 {
            assert!((a.uniform() - b.uniform()).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn different_seed_diverges() {
        let mut a = Rng::new(1);
        let mut b = Rng::new(2);
        let seq_a: Vec<f64> = (0..10).map(|_| a.uniform()).collect();
        let seq_b: Vec<f64> = (0..10).map(|_| b.uniform()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn uniform_range_is_bounded() {
        let mut r = Rng::new(7);
        for _ in 0..1000 {
            let x = r.uniform_range(2.0, 5.0);
            assert!((2.0..5.0).contains(&x));
        }
    }

    #[test]
    fn index_stays_in_bounds() {
        let mut r = Rng::new(9);
        for _ in 0..1000 {
            assert!(r.index(7) < 7);
        }
    }

    #[test]
    fn reseed_reproduces_fresh_sequence() {
        let mut a = Rng::new(3);
        let first: Vec<f64> = (0..5).map(|_| a.uniform()).collect();
        a.seed(3);
        let second: Vec<f64> = (0..5).map(|_| a.uniform()).collect();
        assert_eq!(first, second);
    }
}
