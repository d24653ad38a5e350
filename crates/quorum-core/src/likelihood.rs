//! Held-out scoring against a fitted chain.
//!
//! Scoring replays only the label layer: labels for the new data are
//! majority-vote initialized once, then resampled once per retained
//! sample using that sample's prior, confusion matrices, and cluster
//! assignment. Around each replay the closed-form joint terms are
//! accumulated and the result is averaged over the retained trajectory.
//! The fitted chain itself is never mutated.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::warn;

use quorum_math::BetaParams;

use crate::annotations::AnnotationMatrix;
use crate::error::{Error, Result};
use crate::sampler::{FittedChain, CONFUSION_PRIOR};
use crate::store::DomainSample;

impl FittedChain {
    /// Average log-likelihood of new vote matrices under the retained
    /// trajectory.
    ///
    /// The matrices must cover the same domains and annotators the chain
    /// was fit on; item counts are free. Scoring is deterministic for a
    /// given chain: its RNG stream is derived from the chain seed,
    /// disjoint from the fitting streams.
    pub fn log_likelihood(&self, domains: &[AnnotationMatrix]) -> Result<f64> {
        if domains.len() != self.domains() {
            return Err(Error::DomainCountMismatch {
                expected: self.domains(),
                got: domains.len(),
            });
        }
        for (p, d) in domains.iter().enumerate() {
            if d.annotators() != self.annotators {
                return Err(Error::AnnotatorCountMismatch {
                    domain: p,
                    expected: self.annotators,
                    got: d.annotators(),
                });
            }
        }

        let views: Vec<Vec<Vec<u8>>> = domains.iter().map(AnnotationMatrix::by_annotator).collect();
        let mut labels: Vec<Vec<u8>> = domains
            .iter()
            .map(AnnotationMatrix::majority_labels)
            .collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        rng.long_jump();

        let log_annotators = (self.annotators as f64).ln();
        let mut total = 0.0;
        for s in 0..self.store.len() {
            for (p, d) in self.store.get(s).iter().enumerate() {
                replay_label_pass(&mut rng, d, &views[p], &mut labels[p]);
                total += sample_log_joint(d, &views[p], &labels[p], log_annotators);
            }
        }
        Ok(total / self.store.len() as f64)
    }
}

/// One count-free pass of the label-sampling step under a retained
/// sample's parameters.
fn replay_label_pass(
    rng: &mut Xoshiro256PlusPlus,
    d: &DomainSample,
    votes: &[Vec<u8>],
    labels: &mut [u8],
) {
    for i in 0..labels.len() {
        let mut w0 = 1.0 - d.prior;
        let mut w1 = d.prior;
        for (j, votes_j) in votes.iter().enumerate() {
            let m = &d.matrices[d.assignment[j]];
            let o = votes_j[i] as usize;
            w0 *= m[0][o];
            w1 *= m[1][o];
        }
        let total = w0 + w1;
        if !total.is_finite() || total <= 0.0 {
            warn!(item = i, "label weights underflowed; keeping current label");
            continue;
        }
        labels[i] = u8::from(rng.random::<f64>() < w1 / total);
    }
}

/// Closed-form log joint of one domain under one retained sample: label
/// prior density, CRP partition term in multinomial-coefficient form,
/// label Bernoulli terms, confusion Beta-prior terms for populated
/// clusters, and the vote likelihood.
fn sample_log_joint(
    d: &DomainSample,
    votes: &[Vec<u8>],
    labels: &[u8],
    log_annotators: f64,
) -> f64 {
    let mut total = BetaParams::uniform().log_pdf(d.prior);

    let mut sizes = vec![0usize; d.matrices.len()];
    for &c in &d.assignment {
        sizes[c] += 1;
    }
    for &c in &d.assignment {
        total += (sizes[c] as f64).ln() - log_annotators;
    }

    for &label in labels {
        total += if label == 1 {
            d.prior.ln()
        } else {
            (1.0 - d.prior).ln()
        };
    }

    for (c, &size) in sizes.iter().enumerate() {
        if size > 0 {
            for t in 0..2 {
                for o in 0..2 {
                    total += CONFUSION_PRIOR[t][o] * d.matrices[c][t][o].ln();
                }
            }
        }
    }

    for (j, votes_j) in votes.iter().enumerate() {
        let m = &d.matrices[d.assignment[j]];
        for (i, &v) in votes_j.iter().enumerate() {
            total += m[labels[i] as usize][v as usize].ln();
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{ChainConfig, GibbsSampler};

    fn fit_small() -> (FittedChain, Vec<AnnotationMatrix>) {
        let rows = vec![
            vec![true, true, true],
            vec![false, false, false],
            vec![true, true, false],
            vec![false, false, true],
        ];
        let domains = vec![AnnotationMatrix::from_rows(rows).unwrap()];
        let config = ChainConfig {
            burn_in: 20,
            thinning: 1,
            samples: 10,
            concentration: 1.0,
            seed: 13,
        };
        let chain = GibbsSampler::fit(&domains, config).unwrap();
        (chain, domains)
    }

    #[test]
    fn scoring_is_deterministic_and_finite() {
        let (chain, domains) = fit_small();
        let a = chain.log_likelihood(&domains).unwrap();
        let b = chain.log_likelihood(&domains).unwrap();
        assert_eq!(a, b);
        assert!(a.is_finite());
        assert!(a < 0.0);
    }

    #[test]
    fn scoring_accepts_different_item_counts() {
        let (chain, _) = fit_small();
        let held_out = AnnotationMatrix::from_rows(vec![
            vec![true, true, true],
            vec![true, false, true],
        ])
        .unwrap();
        assert!(chain.log_likelihood(&[held_out]).unwrap().is_finite());
    }

    #[test]
    fn scoring_rejects_shape_mismatches() {
        let (chain, _domains) = fit_small();
        assert!(matches!(
            chain.log_likelihood(&[]),
            Err(Error::DomainCountMismatch {
                expected: 1,
                got: 0
            })
        ));
        let wrong = AnnotationMatrix::from_rows(vec![vec![true, false]]).unwrap();
        assert!(matches!(
            chain.log_likelihood(&[wrong]),
            Err(Error::AnnotatorCountMismatch {
                domain: 0,
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn partition_term_prefers_merged_clusters() {
        // With every annotator in one cluster the partition term is 0;
        // a fully split assignment pays log(1/n) per annotator.
        let merged = DomainSample {
            prior: 0.5,
            labels: vec![1],
            assignment: vec![0, 0, 0],
            matrices: vec![[[0.5; 2]; 2]],
        };
        let split = DomainSample {
            prior: 0.5,
            labels: vec![1],
            assignment: vec![0, 1, 2],
            matrices: vec![[[0.5; 2]; 2]; 3],
        };
        let votes = vec![vec![1u8], vec![1], vec![0]];
        let log_n = 3.0f64.ln();
        let a = sample_log_joint(&merged, &votes, &[1], log_n);
        let b = sample_log_joint(&split, &votes, &[1], log_n);
        assert!(a > b);
    }
}
