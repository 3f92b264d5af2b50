use crate::models::{AlertUpsert, HistoricalCycle, Pillar, PillarScore};

/// Drops smaller than this between cycles are noise.
pub const REGRESSION_TOLERANCE: f64 = 0.02;
pub const MIN_CONSECUTIVE_REGRESSIONS: i32 = 2;
pub const ALERT_TYPE: &str = "regression";

/// Counts consecutive regressions walking `history` newest to oldest, seeded
/// with `current`. Stops at the first cycle that does not regress or that has
/// no score for the pillar.
pub fn consecutive_regressions(
    pillar: Pillar,
    current: f64,
    history: &[HistoricalCycle],
) -> i32 {
    let mut last_score = current;
    let mut count = 0;

    for cycle in history {
        match cycle.scores.get(&pillar) {
            Some(&prior) if last_score < prior - REGRESSION_TOLERANCE => {
                count += 1;
                last_score = prior;
            }
            _ => break,
        }
    }

    count
}

pub fn alert_message(pillar: Pillar, cycles: i32) -> String {
    format!(
        "O pilar {} ({}) apresenta queda em {} ciclos consecutivos de avaliação.",
        pillar.full_name(),
        pillar.code(),
        cycles
    )
}

/// Alerts to upsert for a destination given the freshly committed pillar
/// scores and the earlier calculated cycles, newest first.
pub fn detect_regressions(
    current: &[PillarScore],
    history: &[HistoricalCycle],
) -> Vec<AlertUpsert> {
    current
        .iter()
        .filter_map(|pillar_score| {
            let cycles = consecutive_regressions(pillar_score.pillar, pillar_score.score, history);
            (cycles >= MIN_CONSECUTIVE_REGRESSIONS).then(|| AlertUpsert {
                pillar: pillar_score.pillar,
                consecutive_cycles: cycles,
                message: alert_message(pillar_score.pillar, cycles),
            })
        })
        .collect()
}
