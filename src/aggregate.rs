use std::collections::BTreeMap;

use crate::models::{IndicatorScore, Pillar, PillarScore, Severity};

pub const CRITICAL_MAX: f64 = 0.33;
pub const MODERATE_MAX: f64 = 0.66;

pub fn severity_for(score: f64) -> Severity {
    if score <= CRITICAL_MAX {
        Severity::Critico
    } else if score <= MODERATE_MAX {
        Severity::Moderado
    } else {
        Severity::Bom
    }
}

/// Weighted mean of `(score, weight)` pairs. A zero total weight falls back to
/// the plain mean. Returns `None` for an empty slice.
pub fn weighted_mean(entries: &[(f64, f64)]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }

    let total_weight: f64 = entries.iter().map(|(_, weight)| weight).sum();
    if total_weight == 0.0 {
        let total: f64 = entries.iter().map(|(score, _)| score).sum();
        return Some(total / entries.len() as f64);
    }

    let weighted: f64 = entries.iter().map(|(score, weight)| score * weight).sum();
    Some(weighted / total_weight)
}

/// One row per pillar that has at least one scored indicator, in pillar order.
pub fn aggregate_pillars(scores: &[IndicatorScore]) -> Vec<PillarScore> {
    let mut grouped: BTreeMap<Pillar, Vec<(f64, f64)>> = BTreeMap::new();

    for score in scores {
        grouped
            .entry(score.pillar)
            .or_default()
            .push((score.score, score.weight_used));
    }

    grouped
        .into_iter()
        .filter_map(|(pillar, entries)| {
            weighted_mean(&entries).map(|score| PillarScore {
                pillar,
                score,
                severity: severity_for(score),
            })
        })
        .collect()
}

/// Lowest-scoring pillar; ties resolve to the earlier pillar.
pub fn critical_pillar(pillars: &[PillarScore]) -> Option<&PillarScore> {
    pillars.iter().fold(None, |lowest: Option<&PillarScore>, candidate| match lowest {
        Some(current) if current.score <= candidate.score => Some(current),
        _ => Some(candidate),
    })
}
