//! Quorum Core Library
//!
//! Consensus labeling from noisy binary annotators, without ground truth.
//! Given one boolean vote matrix per domain (items x annotators), a
//! collapsed Gibbs chain jointly infers:
//! - a per-domain label prior,
//! - a latent consensus label for every item,
//! - a partition of annotators into behavior clusters under a Dirichlet
//!   Process prior,
//! - a 2x2 confusion matrix per cluster describing how its members err.
//!
//! The chain runs burn-in sweeps, collects a thinned trajectory of
//! retained samples, and aggregates them into posterior means and
//! variances for the prior, the labels, and per-annotator error rates.
//! A fitted chain can also score held-out vote matrices with an averaged
//! closed-form log-likelihood.
//!
//! ```no_run
//! use quorum_core::{AnnotationMatrix, ChainConfig, GibbsSampler};
//!
//! let domain = AnnotationMatrix::from_rows(vec![
//!     vec![true, true, false],
//!     vec![false, false, false],
//! ])?;
//! let chain = GibbsSampler::fit(&[domain], ChainConfig {
//!     burn_in: 500,
//!     thinning: 2,
//!     samples: 200,
//!     concentration: 1.0,
//!     seed: 42,
//! })?;
//! let consensus = &chain.label_means()[0];
//! # Ok::<(), quorum_core::Error>(())
//! ```

pub mod annotations;
pub mod crp;
pub mod error;
pub mod sampler;
pub mod store;

mod likelihood;
mod stats;

pub use annotations::AnnotationMatrix;
pub use crp::CrpPrior;
pub use error::{Error, Result};
pub use sampler::{ChainConfig, FittedChain, GibbsSampler};
pub use store::{DomainSample, PosteriorSummaries, SampleStore};
