//! End-to-end tests for the optimizer pipeline.
//!
//! These cover the behavioural guarantees of a full run:
//! - Allocation sums to the budget and respects (rescaled) minimums
//! - Identical priors split evenly
//! - Full-minimum and over-committed constraint handling
//! - Percentile ordering of the conversion summary
//! - Invalid budgets and estimates fail before any sampling

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::errors::OptimizerError;
    use crate::optimizer::{sample, BudgetOptimizer, OptimizerConfig};
    use crate::types::{BoundedEstimate, Channel, ChannelPriors, Constraints, PerformancePriors};

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn est(lower: f64, upper: f64, mean: f64) -> BoundedEstimate {
        BoundedEstimate::new(lower, upper, mean).unwrap()
    }

    fn typical_priors() -> PerformancePriors {
        let entries: BTreeMap<Channel, ChannelPriors> = [
            (
                Channel::Google,
                ChannelPriors {
                    cvr: est(0.03, 0.06, 0.045),
                    cpm: est(20.0, 40.0, 30.0),
                    ctr: est(0.02, 0.05, 0.035),
                },
            ),
            (
                Channel::LinkedIn,
                ChannelPriors {
                    cvr: est(0.02, 0.08, 0.05),
                    cpm: est(30.0, 80.0, 50.0),
                    ctr: est(0.004, 0.01, 0.006),
                },
            ),
            (
                Channel::Meta,
                ChannelPriors {
                    cvr: est(0.01, 0.04, 0.025),
                    cpm: est(7.0, 15.0, 11.0),
                    ctr: est(0.008, 0.015, 0.011),
                },
            ),
            (
                Channel::TikTok,
                ChannelPriors {
                    cvr: est(0.005, 0.02, 0.012),
                    cpm: est(5.0, 12.0, 9.0),
                    ctr: est(0.008, 0.02, 0.012),
                },
            ),
        ]
        .into_iter()
        .collect();
        PerformancePriors::new(entries).unwrap()
    }

    fn identical_priors(channels: &[Channel]) -> PerformancePriors {
        let p = ChannelPriors {
            cvr: est(0.02, 0.05, 0.03),
            cpm: est(8.0, 14.0, 10.0),
            ctr: est(0.01, 0.02, 0.015),
        };
        PerformancePriors::new(channels.iter().map(|&ch| (ch, p)).collect()).unwrap()
    }

    fn seeded_optimizer(seed: u64) -> BudgetOptimizer {
        BudgetOptimizer::new(OptimizerConfig {
            random_seed: seed,
            ..Default::default()
        })
        .unwrap()
    }

    fn constraints(entries: &[(Channel, f64)]) -> Constraints {
        Constraints::new(entries.iter().copied().collect()).unwrap()
    }

    // =========================================================================
    // Allocation Invariants
    // =========================================================================

    #[test]
    fn test_allocation_sums_to_budget() {
        let opt = seeded_optimizer(42);
        let priors = typical_priors();

        for budget in [100.0, 1_000.0, 12_345.67, 250_000.0] {
            for c in [
                Constraints::none(),
                constraints(&[(Channel::Google, 0.3), (Channel::TikTok, 0.1)]),
                constraints(&[(Channel::Meta, 0.9), (Channel::LinkedIn, 0.6)]),
            ] {
                let (_, allocation) = opt.run(&priors, budget, &c).unwrap();
                let rel_err = (allocation.total() - budget).abs() / budget;
                assert!(rel_err < 1e-6, "budget {} allocated {}", budget, allocation.total());
            }
        }
    }

    #[test]
    fn test_allocation_respects_rescaled_minimums() {
        let opt = seeded_optimizer(7);
        let priors = typical_priors();
        let c = constraints(&[
            (Channel::Google, 0.5),
            (Channel::LinkedIn, 0.4),
            (Channel::Meta, 0.3),
        ]);

        let report = opt.run_detailed(&priors, 10_000.0, &c).unwrap();
        assert!(report.minimums_rescaled);
        assert_eq!(report.remaining_budget, 0.0);
        let min_sum: f64 = report.min_budgets.values().sum();
        assert!((min_sum - 10_000.0).abs() < 1e-6);

        for (ch, min) in &report.min_budgets {
            assert!(
                report.allocation.get(*ch) >= *min - 1e-9,
                "{} below its minimum",
                ch
            );
        }
        assert!(report.allocation.get(Channel::TikTok).abs() < 1e-9);
    }

    #[test]
    fn test_fractions_summing_to_one_allocate_minimums() {
        let opt = seeded_optimizer(3);
        let c = constraints(&[
            (Channel::Google, 0.4),
            (Channel::LinkedIn, 0.3),
            (Channel::Meta, 0.2),
            (Channel::TikTok, 0.1),
        ]);
        let report = opt.run_detailed(&typical_priors(), 5_000.0, &c).unwrap();
        assert_eq!(report.remaining_budget, 0.0);
        for (ch, min) in &report.min_budgets {
            assert!((report.allocation.get(*ch) - min).abs() < 1e-6);
        }
    }

    #[test]
    fn test_softmax_weights_sum_to_one() {
        let report = seeded_optimizer(11)
            .run_detailed(&typical_priors(), 8_000.0, &Constraints::none())
            .unwrap();
        let sum: f64 = report.weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[test]
    fn test_identical_priors_split_evenly() {
        let priors = identical_priors(&[Channel::Google, Channel::Meta]);
        let (_, allocation) = seeded_optimizer(42)
            .run(&priors, 1000.0, &Constraints::none())
            .unwrap();
        assert!((allocation.get(Channel::Google) - 500.0).abs() < 1e-6);
        assert!((allocation.get(Channel::Meta) - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_full_minimum_takes_whole_budget() {
        let priors = typical_priors();
        let c = constraints(&[(Channel::TikTok, 1.0)]);
        let (summary, allocation) = seeded_optimizer(42).run(&priors, 1000.0, &c).unwrap();

        assert!((allocation.get(Channel::TikTok) - 1000.0).abs() < 1e-9);
        for ch in [Channel::Google, Channel::LinkedIn, Channel::Meta] {
            assert!(allocation.get(ch).abs() < 1e-9);
            assert_eq!(summary.channel(ch).unwrap().mean, 0.0);
        }
    }

    #[test]
    fn test_non_positive_budget_fails() {
        let opt = seeded_optimizer(42);
        for budget in [0.0, -1000.0] {
            let err = opt
                .run(&typical_priors(), budget, &Constraints::none())
                .unwrap_err();
            assert_eq!(err, OptimizerError::InvalidBudget(budget));
        }
    }

    #[test]
    fn test_inverted_estimate_fails_before_sampling() {
        let json = r#"{
            "google": {
                "CVR": {"lower": 0.03, "upper": 0.06, "mean": 0.045},
                "CPM": {"lower": 40.0, "upper": 20.0, "mean": 30.0},
                "CTR": {"lower": 0.02, "upper": 0.05, "mean": 0.035}
            }
        }"#;
        let err = serde_json::from_str::<PerformancePriors>(json).unwrap_err();
        assert!(err.to_string().contains("upper < lower"), "{}", err);

        assert!(matches!(
            BoundedEstimate::new(40.0, 20.0, 30.0),
            Err(OptimizerError::InvalidEstimate { .. })
        ));
    }

    #[test]
    fn test_constraint_for_unknown_channel_fails() {
        let priors = identical_priors(&[Channel::Google]);
        let c = constraints(&[(Channel::LinkedIn, 0.2)]);
        let err = seeded_optimizer(1).run(&priors, 500.0, &c).unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::MissingChannelData {
                channel: Channel::LinkedIn,
                ..
            }
        ));
    }

    // =========================================================================
    // Summary Properties
    // =========================================================================

    #[test]
    fn test_summary_percentiles_ordered() {
        let (summary, _) = seeded_optimizer(42)
            .run(
                &typical_priors(),
                20_000.0,
                &constraints(&[(Channel::Meta, 0.2), (Channel::TikTok, 0.15)]),
            )
            .unwrap();

        for (ch, band) in &summary.channels {
            assert!(band.is_ordered(1e-9), "{} band {:?}", ch, band);
        }
        assert!(summary.total.is_ordered(1e-9));
        assert!(summary.total.mean > 0.0);
    }

    #[test]
    fn test_total_mean_is_sum_of_channel_means() {
        let (summary, _) = seeded_optimizer(9)
            .run(&typical_priors(), 6_000.0, &Constraints::none())
            .unwrap();
        let sum: f64 = summary.channels.values().map(|b| b.mean).sum();
        assert!((summary.total.mean - sum).abs() < 1e-6 * sum.max(1.0));
    }

    #[test]
    fn test_output_serializes_to_nested_maps() {
        let (summary, allocation) = seeded_optimizer(5)
            .run(&typical_priors(), 4_000.0, &Constraints::none())
            .unwrap();

        let summary_json = serde_json::to_value(&summary).unwrap();
        for key in ["google", "linkedin", "meta", "tiktok", "total"] {
            for metric in ["P10", "mean", "P90"] {
                assert!(summary_json[key][metric].is_number(), "missing {key}.{metric}");
            }
        }
        let allocation_json = serde_json::to_value(&allocation).unwrap();
        assert!(allocation_json["google"].is_number());
    }

    #[test]
    fn test_different_seeds_differ() {
        let priors = typical_priors();
        let a = seeded_optimizer(1)
            .run_detailed(&priors, 5_000.0, &Constraints::none())
            .unwrap();
        let b = seeded_optimizer(2)
            .run_detailed(&priors, 5_000.0, &Constraints::none())
            .unwrap();
        assert_ne!(a.summary.total.mean, b.summary.total.mean);
    }

    #[test]
    fn test_samples_stay_in_bounds_across_priors() {
        let mut rng = StdRng::seed_from_u64(42);
        for (_, p) in typical_priors().iter() {
            for est in [p.cvr, p.cpm, p.ctr] {
                for _ in 0..2000 {
                    let x = sample(&est, &mut rng).unwrap();
                    assert!(est.contains(x));
                }
            }
        }
    }
}
