//! Collapsed Gibbs sampler for consensus labels, annotator reliability,
//! and behavior clusters.
//!
//! The model, per domain:
//!
//! ```text
//! pi ~ Beta(1, 1)                      label prior
//! z_i | pi ~ Bernoulli(pi)             latent consensus label of item i
//! c_j ~ CRP(alpha)                     behavior cluster of annotator j
//! m_c[t][.] ~ Beta(1, 1) per row       cluster confusion matrix
//! x_ji | z_i, c_j ~ m_{c_j}[z_i][.]    observed vote
//! ```
//!
//! One sweep resamples, in order: priors, the confusion rows of every
//! populated cluster, every annotator's cluster assignment, and every
//! item's label. Cluster assignments are drawn from an open-ended
//! candidate set (populated clusters plus one fresh id) with a cumulative
//! inverse-CDF scan kept entirely in log space. Label draws stay in direct
//! space; with very many annotators or extreme confusion rows the product
//! of cell probabilities can underflow, in which case the item keeps its
//! current label and a warning is logged.
//!
//! Domains are data-independent and each owns its own RNG stream, so the
//! per-domain loops could be dispatched to worker threads without any
//! shared state; sweeps themselves are inherently sequential.

use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quorum_math::{log_add_exp, BetaParams};

use crate::annotations::AnnotationMatrix;
use crate::crp::CrpPrior;
use crate::error::{Error, Result};
use crate::stats::SufficientStats;
use crate::store::{DomainSample, PosteriorSummaries, SampleStore};

/// Beta prior on each confusion row, `[t][o]` aligned with the cells.
pub(crate) const CONFUSION_PRIOR: [[f64; 2]; 2] = [[1.0, 1.0], [1.0, 1.0]];

/// Chain shape and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Sweeps discarded before collection starts.
    pub burn_in: usize,
    /// Extra sweeps between retained samples; `(thinning + 1)` sweeps are
    /// run per sample.
    pub thinning: usize,
    /// Number of retained samples; must be at least 1.
    pub samples: usize,
    /// CRP concentration; the prior weight of opening a new cluster.
    pub concentration: f64,
    /// Seed of the chain's RNG streams.
    pub seed: u64,
}

impl ChainConfig {
    fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(Error::NoRetainedSamples);
        }
        if !self.concentration.is_finite() || self.concentration <= 0.0 {
            return Err(Error::InvalidConcentration {
                got: self.concentration,
            });
        }
        Ok(())
    }
}

fn draw_beta(rng: &mut Xoshiro256PlusPlus, params: BetaParams) -> f64 {
    Beta::new(params.alpha, params.beta)
        .expect("beta shapes are positive by construction")
        .sample(rng)
}

/// Draw both confusion rows of one cluster from their count posteriors.
/// Column 0 is sampled, column 1 is its complement.
fn draw_confusion_rows(
    rng: &mut Xoshiro256PlusPlus,
    counts: &[[u32; 2]; 2],
) -> [[f64; 2]; 2] {
    let mut rows = [[0.0; 2]; 2];
    for t in 0..2 {
        let p0 = draw_beta(rng, BetaParams::uniform().observe(counts[t][0], counts[t][1]));
        rows[t] = [p0, 1.0 - p0];
    }
    rows
}

/// Live chain state for one domain.
#[derive(Debug)]
struct DomainChain {
    votes: Vec<Vec<u8>>,
    items: usize,
    labels: Vec<u8>,
    assignment: Vec<usize>,
    prior: f64,
    matrices: Vec<[[f64; 2]; 2]>,
    stats: SufficientStats,
    crp: CrpPrior,
    rng: Xoshiro256PlusPlus,
}

impl DomainChain {
    /// Warm start: majority-vote labels, all annotators in cluster 0, the
    /// prior and cluster 0's confusion rows drawn from their warm-start
    /// count posteriors.
    fn new(matrix: &AnnotationMatrix, concentration: f64, mut rng: Xoshiro256PlusPlus) -> Self {
        let votes = matrix.by_annotator();
        let labels = matrix.majority_labels();
        let items = matrix.items();
        let assignment = vec![0; matrix.annotators()];

        let mut crp = CrpPrior::new(concentration);
        for _ in 0..matrix.annotators() {
            crp.add_member(0);
        }

        let mut stats = SufficientStats::new();
        stats.ensure_cluster(0);
        for (i, &label) in labels.iter().enumerate() {
            stats.add_item(i, label, &assignment, &votes);
        }

        let [n0, n1] = stats.label_counts();
        let prior = draw_beta(&mut rng, BetaParams::uniform().observe(n1, n0));
        let matrices = vec![draw_confusion_rows(&mut rng, stats.confusion(0))];

        Self {
            votes,
            items,
            labels,
            assignment,
            prior,
            matrices,
            stats,
            crp,
            rng,
        }
    }

    /// Step 1: pi ~ Beta(1 + n1, 1 + n0).
    fn sample_prior(&mut self) {
        let [n0, n1] = self.stats.label_counts();
        self.prior = draw_beta(&mut self.rng, BetaParams::uniform().observe(n1, n0));
    }

    /// Step 2: redraw the confusion rows of every populated cluster from
    /// their count posteriors. Retired and unopened clusters are not
    /// touched.
    fn sample_confusion(&mut self) {
        for k in 0..self.crp.active_count() {
            let c = self.crp.active()[k];
            self.matrices[c] = draw_confusion_rows(&mut self.rng, self.stats.confusion(c));
        }
    }

    /// Step 3: resample every annotator's cluster over the populated
    /// clusters plus one fresh candidate, with collapsed log-weights
    /// `log(crp weight) + sum_cells count * log(cell probability)`.
    fn sample_assignments(&mut self) {
        for j in 0..self.assignment.len() {
            let old = self.assignment[j];
            self.stats.detach_annotator(old, &self.labels, &self.votes[j]);
            self.crp.remove_member(old);

            let fresh = self.crp.next_id();
            self.stats.ensure_cluster(fresh);
            if self.matrices.len() <= fresh {
                self.matrices.resize(fresh + 1, [[0.5; 2]; 2]);
            }
            let mut candidates = self.crp.active().to_vec();
            candidates.push(fresh);

            // Cumulative log-weights: subtract the running max, then fold
            // with log_add_exp so the inverse-CDF walk happens entirely in
            // log space.
            let mut cdf = Vec::with_capacity(candidates.len());
            let mut max = f64::NEG_INFINITY;
            for &c in &candidates {
                let counts = self.stats.confusion(c);
                let m = &self.matrices[c];
                let mut w = self.crp.weight(c).ln();
                for t in 0..2 {
                    for o in 0..2 {
                        if counts[t][o] > 0 {
                            w += f64::from(counts[t][o]) * m[t][o].ln();
                        }
                    }
                }
                max = max.max(w);
                cdf.push(w);
            }
            cdf[0] -= max;
            for k in 1..cdf.len() {
                cdf[k] = log_add_exp(cdf[k - 1], cdf[k] - max);
            }

            let total = cdf[cdf.len() - 1];
            let target = self.rng.random::<f64>().max(f64::MIN_POSITIVE).ln() + total;
            let mut chosen = fresh;
            for (k, &cum) in cdf.iter().take(cdf.len() - 1).enumerate() {
                if cum > target {
                    chosen = candidates[k];
                    break;
                }
            }

            self.assignment[j] = chosen;
            self.stats.attach_annotator(chosen, &self.labels, &self.votes[j]);
            self.crp.add_member(chosen);
            if chosen == fresh {
                // A cluster opened mid-step has no row draw from step 2;
                // give it one conditioned on its new member so step 4
                // never reads an unsampled matrix.
                self.matrices[chosen] =
                    draw_confusion_rows(&mut self.rng, self.stats.confusion(chosen));
            }
        }
    }

    /// Step 4: resample every item's label from the two-outcome
    /// conditional, in direct space.
    fn sample_labels(&mut self) {
        for i in 0..self.items {
            let mut w0 = 1.0 - self.prior;
            let mut w1 = self.prior;
            for (j, &c) in self.assignment.iter().enumerate() {
                let m = &self.matrices[c];
                let o = self.votes[j][i] as usize;
                w0 *= m[0][o];
                w1 *= m[1][o];
            }
            let total = w0 + w1;
            if !total.is_finite() || total <= 0.0 {
                warn!(item = i, "label weights underflowed; keeping current label");
                continue;
            }
            let new = u8::from(self.rng.random::<f64>() < w1 / total);
            let old = self.labels[i];
            if new != old {
                self.stats
                    .relabel_item(i, old, new, &self.assignment, &self.votes);
                self.labels[i] = new;
            }
        }
    }

    fn sweep(&mut self) {
        self.sample_prior();
        self.sample_confusion();
        self.sample_assignments();
        self.sample_labels();
    }

    fn snapshot(&self) -> DomainSample {
        DomainSample {
            prior: self.prior,
            labels: self.labels.clone(),
            assignment: self.assignment.clone(),
            matrices: self.matrices.clone(),
        }
    }
}

/// The chain orchestrator: burn-in, thinned collection, aggregation.
#[derive(Debug)]
pub struct GibbsSampler {
    config: ChainConfig,
    annotators: usize,
    chains: Vec<DomainChain>,
}

impl GibbsSampler {
    /// Validate the inputs and warm-start one chain per domain.
    ///
    /// Every domain must report the same annotator count. Each domain
    /// receives its own jumped RNG stream derived from `config.seed`.
    pub fn new(domains: &[AnnotationMatrix], config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let Some(first) = domains.first() else {
            return Err(Error::NoDomains);
        };
        let annotators = first.annotators();
        for (p, d) in domains.iter().enumerate() {
            if d.annotators() != annotators {
                return Err(Error::AnnotatorCountMismatch {
                    domain: p,
                    expected: annotators,
                    got: d.annotators(),
                });
            }
        }

        let mut master = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let chains = domains
            .iter()
            .map(|d| {
                let stream = master.clone();
                master.jump();
                DomainChain::new(d, config.concentration, stream)
            })
            .collect();

        Ok(Self {
            config,
            annotators,
            chains,
        })
    }

    /// Run the chain to completion and aggregate posterior summaries.
    pub fn run(mut self) -> FittedChain {
        debug!(
            domains = self.chains.len(),
            annotators = self.annotators,
            burn_in = self.config.burn_in,
            thinning = self.config.thinning,
            samples = self.config.samples,
            "running gibbs chain"
        );
        for _ in 0..self.config.burn_in {
            for chain in &mut self.chains {
                chain.sweep();
            }
        }
        debug!("burn-in complete");

        let mut store = SampleStore::with_capacity(self.config.samples);
        for _ in 0..self.config.samples {
            for _ in 0..=self.config.thinning {
                for chain in &mut self.chains {
                    chain.sweep();
                }
            }
            store.push(self.chains.iter().map(DomainChain::snapshot).collect());
        }
        debug!(retained = store.len(), "collection complete");

        let summaries = store.aggregate();
        FittedChain {
            config: self.config,
            annotators: self.annotators,
            store,
            summaries,
        }
    }

    /// Convenience: `new` followed by `run`.
    pub fn fit(domains: &[AnnotationMatrix], config: ChainConfig) -> Result<FittedChain> {
        Ok(Self::new(domains, config)?.run())
    }
}

/// A completed chain: the retained trajectory plus its posterior
/// summaries.
pub struct FittedChain {
    pub(crate) config: ChainConfig,
    pub(crate) annotators: usize,
    pub(crate) store: SampleStore,
    summaries: PosteriorSummaries,
}

impl FittedChain {
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn annotators(&self) -> usize {
        self.annotators
    }

    pub fn domains(&self) -> usize {
        self.summaries.prior_means.len()
    }

    pub fn samples(&self) -> &SampleStore {
        &self.store
    }

    pub fn summaries(&self) -> &PosteriorSummaries {
        &self.summaries
    }

    /// Posterior mean of the label prior, per domain.
    pub fn prior_means(&self) -> &[f64] {
        &self.summaries.prior_means
    }

    pub fn prior_variances(&self) -> &[f64] {
        &self.summaries.prior_variances
    }

    /// Posterior mean of the consensus label, per domain per item.
    pub fn label_means(&self) -> &[Vec<f64>] {
        &self.summaries.label_means
    }

    pub fn label_variances(&self) -> &[Vec<f64>] {
        &self.summaries.label_variances
    }

    /// Posterior mean error rate, per domain per annotator.
    pub fn error_rate_means(&self) -> &[Vec<f64>] {
        &self.summaries.error_rate_means
    }

    pub fn error_rate_variances(&self) -> &[Vec<f64>] {
        &self.summaries.error_rate_variances
    }
}
