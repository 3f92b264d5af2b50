use crate::models::{Direction, IndicatorScore, IndicatorValue, Normalization};

pub const DEFAULT_MIN_REF: f64 = 0.0;
pub const DEFAULT_MAX_REF: f64 = 100.0;

/// Maps a raw measurement to a score in `[0, 1]`. Missing and NaN values
/// score 0 under every strategy.
pub fn normalize(
    value: Option<f64>,
    min_ref: Option<f64>,
    max_ref: Option<f64>,
    direction: Direction,
    strategy: Normalization,
) -> f64 {
    let Some(value) = value.filter(|v| !v.is_nan()) else {
        return 0.0;
    };

    match strategy {
        Normalization::Binary => {
            if value > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        // Cut points apply to the raw value, not a min/max-scaled one.
        Normalization::Bands => band_score(value),
        Normalization::MinMax => {
            let min = min_ref.unwrap_or(DEFAULT_MIN_REF);
            let max = max_ref.unwrap_or(DEFAULT_MAX_REF);
            if max == min {
                return 0.5;
            }
            let scaled = ((value - min) / (max - min)).clamp(0.0, 1.0);
            match direction {
                Direction::HighIsBetter => scaled,
                Direction::LowIsBetter => 1.0 - scaled,
            }
        }
    }
}

fn band_score(value: f64) -> f64 {
    if value <= 0.3 {
        0.2
    } else if value <= 0.5 {
        0.5
    } else if value <= 0.7 {
        0.8
    } else {
        1.0
    }
}

/// Scores every measurement, capturing the bounds and weight actually used.
pub fn score_indicators(values: &[IndicatorValue]) -> Vec<IndicatorScore> {
    values
        .iter()
        .map(|value| {
            let def = &value.definition;
            let score = normalize(
                value.value_raw,
                def.min_ref,
                def.max_ref,
                def.direction,
                def.normalization,
            );
            let (min_ref_used, max_ref_used) = match def.normalization {
                Normalization::MinMax => (
                    Some(def.min_ref.unwrap_or(DEFAULT_MIN_REF)),
                    Some(def.max_ref.unwrap_or(DEFAULT_MAX_REF)),
                ),
                _ => (def.min_ref, def.max_ref),
            };

            IndicatorScore {
                indicator_id: def.id,
                code: def.code.clone(),
                name: def.name.clone(),
                pillar: def.pillar,
                theme: def.theme.clone(),
                score,
                min_ref_used,
                max_ref_used,
                weight_used: def.weight,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorDefinition, Pillar};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn direction() -> impl Strategy<Value = Direction> {
        prop_oneof![Just(Direction::HighIsBetter), Just(Direction::LowIsBetter)]
    }

    fn strategy() -> impl Strategy<Value = Normalization> {
        prop_oneof![
            Just(Normalization::MinMax),
            Just(Normalization::Bands),
            Just(Normalization::Binary)
        ]
    }

    #[test]
    fn min_max_midpoint_and_inversion() {
        let high = |v| {
            normalize(
                Some(v),
                Some(0.0),
                Some(100.0),
                Direction::HighIsBetter,
                Normalization::MinMax,
            )
        };
        let low = |v| {
            normalize(
                Some(v),
                Some(0.0),
                Some(100.0),
                Direction::LowIsBetter,
                Normalization::MinMax,
            )
        };
        assert_eq!(high(50.0), 0.5);
        assert_eq!(low(0.0), 1.0);
        assert_eq!(low(100.0), 0.0);
    }

    #[test]
    fn min_max_defaults_to_zero_to_hundred() {
        let score = normalize(
            Some(25.0),
            None,
            None,
            Direction::HighIsBetter,
            Normalization::MinMax,
        );
        assert_eq!(score, 0.25);
    }

    #[test]
    fn min_max_clamps_out_of_range_values() {
        let clamp = |v| {
            normalize(
                Some(v),
                Some(0.0),
                Some(100.0),
                Direction::HighIsBetter,
                Normalization::MinMax,
            )
        };
        let over = clamp(250.0);
        let under = clamp(-10.0);
        assert_eq!(over, 1.0);
        assert_eq!(under, 0.0);
    }

    #[test]
    fn band_fixed_points() {
        let band = |v| {
            normalize(
                Some(v),
                None,
                None,
                Direction::HighIsBetter,
                Normalization::Bands,
            )
        };
        assert_eq!(band(0.3), 0.2);
        assert_eq!(band(0.5), 0.5);
        assert_eq!(band(0.7), 0.8);
        assert_eq!(band(0.71), 1.0);
        assert_eq!(band(42.0), 1.0);
    }

    #[test]
    fn binary_requires_positive_value() {
        let bin = |v| {
            normalize(
                Some(v),
                None,
                None,
                Direction::HighIsBetter,
                Normalization::Binary,
            )
        };
        assert_eq!(bin(0.0), 0.0);
        assert_eq!(bin(-3.0), 0.0);
        assert_eq!(bin(0.01), 1.0);
    }

    #[test]
    fn nan_scores_like_a_missing_value_under_every_strategy() {
        for strategy in [
            Normalization::MinMax,
            Normalization::Bands,
            Normalization::Binary,
        ] {
            for direction in [Direction::HighIsBetter, Direction::LowIsBetter] {
                let score = normalize(Some(f64::NAN), Some(0.0), Some(100.0), direction, strategy);
                let missing = normalize(None, Some(0.0), Some(100.0), direction, strategy);
                assert_eq!(score, 0.0, "{strategy:?} {direction:?}");
                assert_eq!(score, missing);
            }
        }
    }

    #[test]
    fn scores_capture_effective_bounds() {
        let values = vec![IndicatorValue {
            definition: IndicatorDefinition {
                id: Uuid::new_v4(),
                code: "RA-01".to_string(),
                name: "Cobertura de saneamento".to_string(),
                pillar: Pillar::Ra,
                theme: "ambiental".to_string(),
                direction: Direction::HighIsBetter,
                normalization: Normalization::MinMax,
                min_ref: None,
                max_ref: Some(80.0),
                weight: 2.0,
            },
            value_raw: Some(40.0),
        }];

        let scores = score_indicators(&values);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 0.5);
        assert_eq!(scores[0].min_ref_used, Some(0.0));
        assert_eq!(scores[0].max_ref_used, Some(80.0));
        assert_eq!(scores[0].weight_used, 2.0);
    }

    proptest! {
        #[test]
        fn score_is_always_within_unit_interval(
            value in proptest::option::of(-1.0e6f64..1.0e6),
            min_ref in proptest::option::of(-1.0e3f64..1.0e3),
            max_ref in proptest::option::of(-1.0e3f64..1.0e3),
            direction in direction(),
            strategy in strategy(),
        ) {
            let score = normalize(value, min_ref, max_ref, direction, strategy);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn missing_value_scores_zero(
            min_ref in proptest::option::of(-1.0e3f64..1.0e3),
            max_ref in proptest::option::of(-1.0e3f64..1.0e3),
            direction in direction(),
            strategy in strategy(),
        ) {
            prop_assert_eq!(normalize(None, min_ref, max_ref, direction, strategy), 0.0);
        }

        #[test]
        fn degenerate_range_scores_half(
            value in -1.0e6f64..1.0e6,
            bound in -1.0e3f64..1.0e3,
            direction in direction(),
        ) {
            let score = normalize(
                Some(value),
                Some(bound),
                Some(bound),
                direction,
                Normalization::MinMax,
            );
            prop_assert_eq!(score, 0.5);
        }

        #[test]
        fn low_is_better_mirrors_high_is_better(value in -50.0f64..150.0) {
            let high = normalize(
                Some(value),
                Some(0.0),
                Some(100.0),
                Direction::HighIsBetter,
                Normalization::MinMax,
            );
            let low = normalize(
                Some(value),
                Some(0.0),
                Some(100.0),
                Direction::LowIsBetter,
                Normalization::MinMax,
            );
            prop_assert!((high + low - 1.0).abs() < 1e-12);
        }

        #[test]
        fn bands_only_emit_fixed_levels(value in -10.0f64..10.0, direction in direction()) {
            let score = normalize(Some(value), None, None, direction, Normalization::Bands);
            prop_assert!([0.2, 0.5, 0.8, 1.0].contains(&score));
        }

        #[test]
        fn binary_emits_zero_or_one(value in -10.0f64..10.0) {
            let score = normalize(
                Some(value),
                None,
                None,
                Direction::HighIsBetter,
                Normalization::Binary,
            );
            prop_assert!(score == 0.0 || score == 1.0);
        }

        #[test]
        fn non_finite_values_stay_within_unit_interval(
            value in prop_oneof![
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
            ],
            min_ref in proptest::option::of(-1.0e3f64..1.0e3),
            max_ref in proptest::option::of(-1.0e3f64..1.0e3),
            direction in direction(),
            strategy in strategy(),
        ) {
            let score = normalize(Some(value), min_ref, max_ref, direction, strategy);
            prop_assert!((0.0..=1.0).contains(&score));
            if value.is_nan() {
                prop_assert_eq!(score, 0.0);
            }
        }
    }
}
