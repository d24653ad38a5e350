//! Retained-sample storage and posterior aggregation.
//!
//! A snapshot is an explicit, typed clone of the live chain state; slots
//! are preallocated up front and written in collection order. Aggregation
//! is a plain two-pass mean/variance computation over the retained
//! trajectory.

use serde::{Deserialize, Serialize};

/// One domain's slice of a retained sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainSample {
    /// Label prior P(label = 1).
    pub prior: f64,
    /// Consensus label per item.
    pub labels: Vec<u8>,
    /// Cluster id per annotator.
    pub assignment: Vec<usize>,
    /// Confusion matrices indexed by cluster id; `[t][o]` is
    /// P(vote = o | true = t). Retired ids keep their last value and are
    /// never read through `assignment`.
    pub matrices: Vec<[[f64; 2]; 2]>,
}

impl DomainSample {
    /// Confusion-weighted error rate of annotator `j` under this sample:
    /// P(vote = 1 | true = 0) P(true = 0) + P(vote = 0 | true = 1) P(true = 1).
    pub fn error_rate(&self, j: usize) -> f64 {
        let m = &self.matrices[self.assignment[j]];
        m[0][1] * (1.0 - self.prior) + m[1][0] * self.prior
    }

    /// Number of distinct clusters referenced by the assignment.
    pub fn cluster_count(&self) -> usize {
        let mut seen = vec![false; self.matrices.len()];
        let mut count = 0;
        for &c in &self.assignment {
            if !seen[c] {
                seen[c] = true;
                count += 1;
            }
        }
        count
    }
}

/// Ordered sequence of retained samples, `[sample][domain]`.
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: Vec<Vec<DomainSample>>,
}

impl SampleStore {
    pub(crate) fn with_capacity(samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(samples),
        }
    }

    pub(crate) fn push(&mut self, sample: Vec<DomainSample>) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The per-domain state of retained sample `s`.
    pub fn get(&self, s: usize) -> &[DomainSample] {
        &self.samples[s]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[DomainSample]> {
        self.samples.iter().map(Vec::as_slice)
    }

    /// Two-pass posterior summaries over the retained trajectory.
    ///
    /// The store is never empty when this runs; a zero-sample chain is
    /// rejected at construction.
    pub(crate) fn aggregate(&self) -> PosteriorSummaries {
        let n = self.samples.len() as f64;
        let domains = self.samples[0].len();

        let mut out = PosteriorSummaries {
            prior_means: vec![0.0; domains],
            prior_variances: vec![0.0; domains],
            label_means: Vec::with_capacity(domains),
            label_variances: Vec::with_capacity(domains),
            error_rate_means: Vec::with_capacity(domains),
            error_rate_variances: Vec::with_capacity(domains),
        };
        for d in &self.samples[0] {
            out.label_means.push(vec![0.0; d.labels.len()]);
            out.label_variances.push(vec![0.0; d.labels.len()]);
            out.error_rate_means.push(vec![0.0; d.assignment.len()]);
            out.error_rate_variances.push(vec![0.0; d.assignment.len()]);
        }

        for sample in &self.samples {
            for (p, d) in sample.iter().enumerate() {
                out.prior_means[p] += d.prior;
                for (i, &label) in d.labels.iter().enumerate() {
                    out.label_means[p][i] += f64::from(label);
                }
                for j in 0..d.assignment.len() {
                    out.error_rate_means[p][j] += d.error_rate(j);
                }
            }
        }
        for p in 0..domains {
            out.prior_means[p] /= n;
            for mean in &mut out.label_means[p] {
                *mean /= n;
            }
            for mean in &mut out.error_rate_means[p] {
                *mean /= n;
            }
        }

        for sample in &self.samples {
            for (p, d) in sample.iter().enumerate() {
                let dev = d.prior - out.prior_means[p];
                out.prior_variances[p] += dev * dev;
                for (i, &label) in d.labels.iter().enumerate() {
                    let dev = f64::from(label) - out.label_means[p][i];
                    out.label_variances[p][i] += dev * dev;
                }
                for j in 0..d.assignment.len() {
                    let dev = d.error_rate(j) - out.error_rate_means[p][j];
                    out.error_rate_variances[p][j] += dev * dev;
                }
            }
        }
        for p in 0..domains {
            out.prior_variances[p] /= n;
            for var in &mut out.label_variances[p] {
                *var /= n;
            }
            for var in &mut out.error_rate_variances[p] {
                *var /= n;
            }
        }

        out
    }
}

/// Posterior means and variances over the retained trajectory.
///
/// Per-annotator error rates use the confusion-weighted expectation of the
/// sample the annotator's cluster belongs to (see [`DomainSample::error_rate`]),
/// for both the mean and the variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSummaries {
    pub prior_means: Vec<f64>,
    pub prior_variances: Vec<f64>,
    pub label_means: Vec<Vec<f64>>,
    pub label_variances: Vec<Vec<f64>>,
    pub error_rate_means: Vec<Vec<f64>>,
    pub error_rate_variances: Vec<Vec<f64>>,
}
