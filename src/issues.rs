//! Theme-level issue detection and territorial interpretation.
//!
//! Interpretation is an ordered rule table: the first rule whose pillar
//! matches and whose keyword appears in the theme (case-insensitive) wins.
//! Themes matching no rule take their pillar's fallback.

use std::collections::BTreeMap;

use crate::aggregate::{weighted_mean, CRITICAL_MAX};
use crate::models::Interpretation::{Entrega, Estrutural, Gestao};
use crate::models::{
    Evidence, EvidenceIndicator, IndicatorScore, Interpretation, Issue, Pillar, Severity,
};

/// Themes averaging at or above this are adequate and raise no issue.
pub const ADEQUATE_THRESHOLD: f64 = 0.67;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Always(Interpretation),
    /// `critical` when the theme mean is strictly below the critical cut.
    BySeverity {
        critical: Interpretation,
        otherwise: Interpretation,
    },
}

impl Outcome {
    fn resolve(self, mean: f64) -> Interpretation {
        match self {
            Outcome::Always(interpretation) => interpretation,
            Outcome::BySeverity {
                critical,
                otherwise,
            } => {
                if mean < CRITICAL_MAX {
                    critical
                } else {
                    otherwise
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct Rule {
    pub pillar: Pillar,
    pub keywords: &'static [&'static str],
    pub outcome: Outcome,
}

pub const RULES: &[Rule] = &[
    Rule {
        pillar: Pillar::Ra,
        keywords: &["social", "econom", "econôm"],
        outcome: Outcome::Always(Estrutural),
    },
    Rule {
        pillar: Pillar::Ra,
        keywords: &["ambient", "environment", "cultur"],
        outcome: Outcome::BySeverity {
            critical: Estrutural,
            otherwise: Gestao,
        },
    },
    Rule {
        pillar: Pillar::Oe,
        keywords: &[
            "infraestrutura",
            "infrastructure",
            "superestrutura",
            "superstructure",
        ],
        outcome: Outcome::BySeverity {
            critical: Estrutural,
            otherwise: Gestao,
        },
    },
    Rule {
        pillar: Pillar::Oe,
        keywords: &["governan", "institucion", "institution"],
        outcome: Outcome::Always(Gestao),
    },
    Rule {
        pillar: Pillar::Ao,
        keywords: &["oferta", "demanda", "supply", "demand"],
        outcome: Outcome::BySeverity {
            critical: Gestao,
            otherwise: Entrega,
        },
    },
    Rule {
        pillar: Pillar::Ao,
        keywords: &[
            "marketing",
            "promo",
            "desempenho",
            "mercado",
            "performance",
            "market",
        ],
        outcome: Outcome::Always(Entrega),
    },
];

fn fallback(pillar: Pillar) -> Interpretation {
    match pillar {
        Pillar::Ra => Estrutural,
        Pillar::Oe => Gestao,
        Pillar::Ao => Entrega,
    }
}

pub fn interpret(pillar: Pillar, theme: &str, mean: f64) -> Interpretation {
    let theme = theme.to_lowercase();
    RULES
        .iter()
        .find(|rule| {
            rule.pillar == pillar && rule.keywords.iter().any(|keyword| theme.contains(keyword))
        })
        .map(|rule| rule.outcome.resolve(mean))
        .unwrap_or_else(|| fallback(pillar))
}

const THEME_LABELS: &[(&str, &str)] = &[
    ("ambiental", "Meio ambiente"),
    ("cultural", "Patrimônio cultural"),
    ("social", "Dimensão social"),
    ("economico", "Dimensão econômica"),
    ("econômico", "Dimensão econômica"),
    ("infraestrutura", "Infraestrutura"),
    ("superestrutura", "Superestrutura"),
    ("governanca", "Governança"),
    ("governança", "Governança"),
    ("oferta", "Oferta turística"),
    ("demanda", "Demanda turística"),
    ("marketing", "Marketing e promoção"),
    ("mercado", "Desempenho de mercado"),
];

pub fn theme_label(theme: &str) -> String {
    let key = theme.trim().to_lowercase();
    if let Some((_, label)) = THEME_LABELS.iter().find(|(known, _)| *known == key) {
        return (*label).to_string();
    }

    let mut chars = theme.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Anything below the adequate line is at least moderate.
pub fn issue_severity(mean: f64) -> Severity {
    if mean <= CRITICAL_MAX {
        Severity::Critico
    } else {
        Severity::Moderado
    }
}

pub fn issue_title(
    theme: &str,
    severity: Severity,
    pillar: Pillar,
    interpretation: Interpretation,
) -> String {
    format!(
        "{}: desempenho {} em {} ({})",
        theme_label(theme),
        severity.label(),
        pillar.full_name(),
        interpretation.label()
    )
}

/// Issues for every underperforming (pillar, theme) group, most severe first
/// and, within a severity, lowest mean first.
pub fn detect_issues(scores: &[IndicatorScore]) -> Vec<Issue> {
    let mut groups: BTreeMap<(Pillar, &str), Vec<&IndicatorScore>> = BTreeMap::new();
    for score in scores {
        groups
            .entry((score.pillar, score.theme.as_str()))
            .or_default()
            .push(score);
    }

    let mut issues: Vec<Issue> = groups
        .into_iter()
        .filter_map(|((pillar, theme), members)| {
            let entries: Vec<(f64, f64)> = members.iter().map(|m| (m.score, 1.0)).collect();
            let mean = weighted_mean(&entries)?;
            if mean >= ADEQUATE_THRESHOLD {
                return None;
            }

            let severity = issue_severity(mean);
            let interpretation = interpret(pillar, theme, mean);
            Some(Issue {
                pillar,
                theme: theme.to_string(),
                severity,
                interpretation,
                title: issue_title(theme, severity, pillar, interpretation),
                evidence: Evidence {
                    indicators: members
                        .iter()
                        .map(|m| EvidenceIndicator {
                            name: m.name.clone(),
                            code: m.code.clone(),
                            score: m.score,
                        })
                        .collect(),
                    theme_average: mean,
                },
            })
        })
        .collect();

    issues.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then(a.evidence.theme_average.total_cmp(&b.evidence.theme_average))
    });
    issues
}
