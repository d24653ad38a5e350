//! End-to-end chain properties on synthetic data.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use quorum_core::{AnnotationMatrix, ChainConfig, GibbsSampler};

/// Synthetic domain: random true labels, each annotator votes the truth
/// flipped independently with probability `error`.
fn synthetic_domain(
    rng: &mut Xoshiro256PlusPlus,
    items: usize,
    annotators: usize,
    error: f64,
) -> AnnotationMatrix {
    let rows = (0..items)
        .map(|_| {
            let truth = rng.random::<f64>() < 0.5;
            (0..annotators)
                .map(|_| truth != (rng.random::<f64>() < error))
                .collect()
        })
        .collect();
    AnnotationMatrix::from_rows(rows).unwrap()
}

fn flip_votes(matrix: &AnnotationMatrix, rate: f64, seed: u64) -> AnnotationMatrix {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let rows = (0..matrix.items())
        .map(|i| {
            (0..matrix.annotators())
                .map(|j| matrix.vote(i, j) != (rng.random::<f64>() < rate))
                .collect()
        })
        .collect();
    AnnotationMatrix::from_rows(rows).unwrap()
}

#[test]
fn fixed_seed_reproduces_the_whole_trajectory() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(400);
    let domains = vec![
        synthetic_domain(&mut rng, 30, 6, 0.2),
        synthetic_domain(&mut rng, 25, 6, 0.2),
    ];
    let config = ChainConfig {
        burn_in: 50,
        thinning: 1,
        samples: 20,
        concentration: 1.0,
        seed: 99,
    };
    let a = GibbsSampler::fit(&domains, config.clone()).unwrap();
    let b = GibbsSampler::fit(&domains, config).unwrap();

    assert_eq!(a.summaries(), b.summaries());
    for s in 0..a.samples().len() {
        assert_eq!(a.samples().get(s), b.samples().get(s));
    }
    assert_eq!(
        a.log_likelihood(&domains).unwrap(),
        b.log_likelihood(&domains).unwrap()
    );
}

#[test]
fn recovers_consensus_and_error_rates_on_easy_data() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let domain = synthetic_domain(&mut rng, 150, 10, 0.1);
    let config = ChainConfig {
        burn_in: 300,
        thinning: 1,
        samples: 50,
        concentration: 1.0,
        seed: 21,
    };
    let chain = GibbsSampler::fit(&[domain.clone()], config).unwrap();

    // On items with a clear majority the posterior label should agree
    // with the vote.
    let mut unambiguous = 0;
    let mut agree = 0;
    for i in 0..domain.items() {
        let positive = (0..domain.annotators())
            .filter(|&j| domain.vote(i, j))
            .count();
        if positive <= 3 || positive >= 7 {
            unambiguous += 1;
            let majority = positive >= 5;
            let mean = chain.label_means()[0][i];
            if (mean >= 0.5) == majority {
                agree += 1;
            }
        }
    }
    assert!(unambiguous > 100, "synthetic data unexpectedly ambiguous");
    assert!(
        agree as f64 / unambiguous as f64 > 0.95,
        "only {agree}/{unambiguous} unambiguous items agree with majority"
    );

    // Every annotator was built with error rate 0.1.
    for (j, &rate) in chain.error_rate_means()[0].iter().enumerate() {
        assert!(
            (rate - 0.1).abs() < 0.05,
            "annotator {j} posterior error rate {rate} far from 0.1"
        );
    }

    // Half the items are positive by construction.
    assert!((chain.prior_means()[0] - 0.5).abs() < 0.15);
}

#[test]
fn single_annotator_single_item_boundary() {
    let domain = AnnotationMatrix::from_rows(vec![vec![true]]).unwrap();
    let config = ChainConfig {
        burn_in: 20,
        thinning: 0,
        samples: 10,
        concentration: 1.0,
        seed: 3,
    };
    let chain = GibbsSampler::fit(&[domain.clone()], config).unwrap();

    let mean = chain.label_means()[0][0];
    assert!((0.0..=1.0).contains(&mean));
    assert!(chain.prior_means()[0] > 0.0 && chain.prior_means()[0] < 1.0);
    assert!(chain.prior_variances()[0] >= 0.0);
    assert!(chain.log_likelihood(&[domain]).unwrap().is_finite());
}

#[test]
fn identical_annotators_collapse_into_one_cluster() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(31);
    let domains: Vec<AnnotationMatrix> = (0..3)
        .map(|_| {
            let rows = (0..50)
                .map(|_| {
                    let vote = rng.random::<f64>() < 0.5;
                    vec![vote; 5]
                })
                .collect();
            AnnotationMatrix::from_rows(rows).unwrap()
        })
        .collect();
    let config = ChainConfig {
        burn_in: 200,
        thinning: 1,
        samples: 40,
        concentration: 1.0,
        seed: 17,
    };
    let chain = GibbsSampler::fit(&domains, config).unwrap();

    let mut total_clusters = 0usize;
    let mut observations = 0usize;
    for sample in chain.samples().iter() {
        for domain_sample in sample {
            total_clusters += domain_sample.cluster_count();
            observations += 1;
        }
    }
    let mean_clusters = total_clusters as f64 / observations as f64;
    assert!(
        mean_clusters < 2.0,
        "perfectly correlated annotators spread over {mean_clusters} clusters on average"
    );
}

#[test]
fn training_data_scores_higher_than_corrupted_data() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(71);
    let domains: Vec<AnnotationMatrix> = (0..3)
        .map(|_| synthetic_domain(&mut rng, 40, 8, 0.15))
        .collect();
    let config = ChainConfig {
        burn_in: 200,
        thinning: 1,
        samples: 30,
        concentration: 1.0,
        seed: 5,
    };
    let chain = GibbsSampler::fit(&domains, config).unwrap();

    let corrupted: Vec<AnnotationMatrix> = domains
        .iter()
        .enumerate()
        .map(|(p, d)| flip_votes(d, 0.3, 1000 + p as u64))
        .collect();

    let ll_train = chain.log_likelihood(&domains).unwrap();
    let ll_corrupted = chain.log_likelihood(&corrupted).unwrap();
    assert!(
        ll_train > ll_corrupted,
        "training {ll_train} should beat corrupted {ll_corrupted}"
    );
}

#[test]
fn config_and_summaries_round_trip_through_json() {
    let config = ChainConfig {
        burn_in: 10,
        thinning: 0,
        samples: 5,
        concentration: 0.5,
        seed: 1,
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: ChainConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, back);

    let domain = AnnotationMatrix::from_rows(vec![vec![true, false], vec![true, true]]).unwrap();
    let chain = GibbsSampler::fit(&[domain], config).unwrap();
    let json = serde_json::to_string(chain.summaries()).unwrap();
    let back: quorum_core::PosteriorSummaries = serde_json::from_str(&json).unwrap();
    assert_eq!(chain.summaries(), &back);
}
