//! §4.5: weighted at-most-one sampling ("roulette").
//!
//! Given independent per-index Bernoulli probabilities, returns either `None`
//! or exactly one winning index, distributed as "exactly `i` succeeds given
//! at most one success or none succeeds". Used by the per-agent update
//! pipeline to pick which neighbor/virus infects an agent, and by similar
//! at-most-one choices elsewhere in the model.

use crate::rng::Rng;

/// Numerical floor above which a probability is treated as certain, per
/// spec §4.5.
const CERTAINTY_FLOOR: f64 = 1.0 - 1e-100;

/// Runs the roulette algorithm over `probs`, consuming one uniform draw from
/// `rng` (two, if the degenerate case falls through to equal-weighted choice
/// among several certain indices in which case a second draw selects among
/// them).
///
/// Returns `None` when no index wins (including the all-zero case), or
/// `Some(i)` for the winning index into `probs`.
pub fn roulette(probs: &[f64], rng: &mut Rng) -> Option<usize> {
    if probs.is_empty() {
        return None;
    }

    let certain: Vec<usize> = probs
        .iter()
        .enumerate()
        .filter(|(_, &p)| p >= CERTAINTY_FLOOR)
        .map(|(i, _)| i)
        .collect();

    if !certain.is_empty() {
        let pick = rng.index(certain.len());
        return Some(certain[pick]);
    }

    let p0: f64 = probs.iter().map(|&p| 1.0 - p).product();

    let qs: Vec<f64> = probs
        .iter()
        .map(|&p| {
            if p <= 0.0 {
                0.0
            } else {
                p * p0 / (1.0 - p)
            }
        })
        .collect();

    let denom = p0 + qs.iter().sum::<f64>();
    if denom <= 0.0 {
        return None;
    }

    let u = rng.uniform();
    if u < p0 / denom {
        return None;
    }

    let mut cum = p0 / denom;
    for (i, &q) in qs.iter().enumerate() {
        cum += q / denom;
        if u < cum {
            return Some(i);
        }
    }
    // Floating point rounding can leave a residual below 1.0; award the
    // last candidate rather than silently drop the draw.
    probs.len().checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_none() {
        let mut rng = Rng::new(1);
        assert_eq!(roulette(&[], &mut rng), None);
    }

    #[test]
    fn all_zero_is_none() {
        let mut rng = Rng::new(1);
        for _ in 0..20 {
            assert_eq!(roulette(&[0.0, 0.0, 0.0], &mut rng), None);
        }
    }

    #[test]
    fn certain_index_always_wins() {
        let mut rng = Rng::new(5);
        for _ in 0..200 {
            assert_eq!(roulette(&[0.5, 1.0, 0.2], &mut rng), Some(1));
        }
    }

    #[test]
    fn fairness_matches_closed_form() {
        let probs = [0.1, 0.2, 0.3];
        let p0 = (1.0 - 0.1) * (1.0 - 0.2) * (1.0 - 0.3);
        let qs: Vec<f64> = probs.iter().map(|&p| p * p0 / (1.0 - p)).collect();
        let denom = p0 + qs.iter().sum::<f64>();
        let expected = [p0 / denom, qs[0] / denom, qs[1] / denom, qs[2] / denom];

        let n = 200_000usize;
        let mut rng = Rng::new(123);
        let mut counts = [0usize; 4];
        for _ in 0..n {
            match roulette(&probs, &mut rng) {
                None => counts[0] += 1,
                Some(i) => counts[i + 1] += 1,
            }
        }
        for (i, &exp) in expected.iter().enumerate() {
            let observed = counts[i] as f64 / n as f64;
            // 3-sigma binomial tolerance.
            let sigma = (exp * (1.0 - exp) / n as f64).sqrt();
            assert!(
                (observed - exp).abs() < 3.0 * sigma + 1e-3,
                "index {i}: observed {observed}, expected {exp}"
            );
        }
    }

    #[test]
    fn never_selects_more_than_one() {
        let mut rng = Rng::new(77);
        for _ in 0..10_000 {
            let result = roulette(&[0.4, 0.4, 0.4, 0.4], &mut rng);
            if let Some(i) = result {
                assert!(i < 4);
            }
        }
    }
}
