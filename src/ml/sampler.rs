// ============================================================
// Layer 5: Nucleus Sampler
// ============================================================
// Chooses the next token from the last-position scores.
//
//   1. repetition penalty: for every id already in the history,
//      positive scores are divided by the penalty and negative
//      scores multiplied by it (applied once per distinct id)
//   2. softmax
//   3. keep the smallest set of most probable ids whose total
//      probability reaches top_p
//   4. draw one id from that set, proportional to probability
//
// Draws come from a seeded StdRng, so a fixed seed reproduces the
// same continuation for the same model and prompt.
//
// Reference: Holtzman et al. (2020) The Curious Case of Neural Text
//            Degeneration; Keskar et al. (2019) CTRL

use anyhow::{bail, Context, Result};
use rand::{distributions::WeightedIndex, prelude::Distribution, rngs::StdRng, SeedableRng};
use std::collections::HashSet;

use crate::domain::traits::TokenSampler;

#[derive(Debug, Clone)]
pub struct NucleusSampler {
    top_p:             f32,
    frequency_penalty: f32,
    rng:               StdRng,
}

impl NucleusSampler {
    pub fn new(top_p: f32, frequency_penalty: f32, seed: u64) -> Self {
        Self {
            top_p: top_p.clamp(f32::MIN_POSITIVE, 1.0),
            frequency_penalty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Penalised, normalised probabilities restricted to the nucleus,
    /// as (id, probability) pairs sorted from most to least likely.
    pub fn nucleus(&self, scores: &[f32], history: &[u32]) -> Result<Vec<(u32, f32)>> {
        if scores.is_empty() {
            bail!("cannot sample from an empty score vector");
        }

        let mut logits = scores.to_vec();
        if self.frequency_penalty != 1.0 {
            let seen: HashSet<u32> = history.iter().copied().collect();
            for id in seen {
                if let Some(score) = logits.get_mut(id as usize) {
                    if *score > 0.0 {
                        *score /= self.frequency_penalty;
                    } else {
                        *score *= self.frequency_penalty;
                    }
                }
            }
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            bail!("scores contain no finite maximum");
        }
        let exp: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
        let total: f32 = exp.iter().sum();

        let mut ranked: Vec<(u32, f32)> = exp
            .iter()
            .enumerate()
            .map(|(id, &e)| (id as u32, e / total))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut mass = 0.0f32;
        let mut keep = 0;
        for &(_, p) in &ranked {
            mass += p;
            keep += 1;
            if mass >= self.top_p {
                break;
            }
        }
        ranked.truncate(keep);
        Ok(ranked)
    }
}

impl TokenSampler for NucleusSampler {
    fn select(&mut self, scores: &[f32], history: &[u32]) -> Result<u32> {
        let nucleus = self.nucleus(scores, history)?;
        let dist = WeightedIndex::new(nucleus.iter().map(|&(_, p)| p))
            .context("invalid nucleus weights")?;
        Ok(nucleus[dist.sample(&mut self.rng)].0)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_token_is_the_whole_nucleus() {
        let sampler = NucleusSampler::new(0.9, 1.0, 0);
        let nucleus = sampler.nucleus(&[0.0, 10.0, 0.0, 0.0], &[]).unwrap();
        assert_eq!(nucleus.len(), 1);
        assert_eq!(nucleus[0].0, 1);
    }

    #[test]
    fn test_uniform_scores_keep_enough_mass() {
        let sampler = NucleusSampler::new(0.45, 1.0, 0);
        let nucleus = sampler.nucleus(&[1.0; 10], &[]).unwrap();
        assert_eq!(nucleus.len(), 5);
    }

    #[test]
    fn test_penalty_demotes_repeated_ids() {
        let sampler = NucleusSampler::new(1.0, 4.0, 0);
        // id 0 wins without history, loses once it is in the history
        let fresh = sampler.nucleus(&[2.0, 1.5, -1.0], &[]).unwrap();
        assert_eq!(fresh[0].0, 0);
        let repeated = sampler.nucleus(&[2.0, 1.5, -1.0], &[0, 0, 2]).unwrap();
        assert_eq!(repeated[0].0, 1);
        // negative score pushed further down
        assert_eq!(repeated.last().unwrap().0, 2);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let scores: Vec<f32> = (0..50).map(|i| (i % 7) as f32 * 0.3).collect();
        let mut a = NucleusSampler::new(0.9, 1.2, 11);
        let mut b = NucleusSampler::new(0.9, 1.2, 11);
        for _ in 0..20 {
            assert_eq!(a.select(&scores, &[3, 4]).unwrap(), b.select(&scores, &[3, 4]).unwrap());
        }
    }

    #[test]
    fn test_selection_stays_inside_nucleus() {
        let scores = [5.0, 4.9, -3.0, -3.0, -3.0];
        let mut sampler = NucleusSampler::new(0.9, 1.0, 3);
        for _ in 0..50 {
            assert!(sampler.select(&scores, &[]).unwrap() < 2);
        }
    }

    #[test]
    fn test_rejects_empty_and_non_finite_scores() {
        let mut sampler = NucleusSampler::new(0.9, 1.2, 0);
        assert!(sampler.select(&[], &[]).is_err());
        assert!(sampler.select(&[f32::NAN, f32::NAN], &[]).is_err());
    }
}
