use std::collections::BTreeMap;
use std::fmt::Write;

use crate::engine::CalculationOutcome;
use crate::models::{Prescription, TargetAgent};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSummary {
    pub target_agent: TargetAgent,
    pub prescriptions: usize,
    pub top_priority: i32,
}

pub fn summarize_by_agent(prescriptions: &[Prescription]) -> Vec<AgentSummary> {
    let mut map: BTreeMap<&'static str, AgentSummary> = BTreeMap::new();

    for prescription in prescriptions {
        let entry = map
            .entry(prescription.target_agent.code())
            .or_insert(AgentSummary {
                target_agent: prescription.target_agent,
                prescriptions: 0,
                top_priority: prescription.priority,
            });
        entry.prescriptions += 1;
        entry.top_priority = entry.top_priority.min(prescription.priority);
    }

    let mut summaries: Vec<AgentSummary> = map.into_values().collect();
    summaries.sort_by_key(|s| s.top_priority);
    summaries
}

pub fn build_report(outcome: &CalculationOutcome) -> String {
    let result = &outcome.result;
    let derived = &outcome.derived;
    let mut output = String::new();

    let _ = writeln!(output, "# Diagnóstico do destino");
    let _ = writeln!(output, "Avaliação {}", result.assessment_id);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Pilares");

    if derived.pillar_scores.is_empty() {
        let _ = writeln!(output, "Nenhum pilar calculado.");
    } else {
        for pillar in &derived.pillar_scores {
            let _ = writeln!(
                output,
                "- {} ({}): {:.2} ({})",
                pillar.pillar.full_name(),
                pillar.pillar,
                pillar.score,
                pillar.severity.label()
            );
        }
    }

    if let (Some(pillar), Some(score)) = (result.critical_pillar, result.critical_score) {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Pilar crítico: {} ({:.2})",
            pillar.full_name(),
            score
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Problemas identificados");

    if derived.issues.is_empty() {
        let _ = writeln!(output, "Todos os temas em nível adequado.");
    } else {
        for issue in &derived.issues {
            let _ = writeln!(
                output,
                "- {} (média {:.2}, {} indicadores)",
                issue.title,
                issue.evidence.theme_average,
                issue.evidence.indicators.len()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Prescrições");

    if derived.prescriptions.is_empty() {
        let _ = writeln!(output, "Nenhuma capacitação prescrita.");
    } else {
        for prescription in &derived.prescriptions {
            let _ = writeln!(
                output,
                "{}. {} [{}]: {}",
                prescription.priority,
                prescription.course_title,
                prescription.target_agent.code(),
                prescription.justification
            );
        }

        let _ = writeln!(output);
        for summary in summarize_by_agent(&derived.prescriptions) {
            let _ = writeln!(
                output,
                "- {}: {} prescrições (prioridade máxima {})",
                summary.target_agent.code(),
                summary.prescriptions,
                summary.top_priority
            );
        }
    }

    if !outcome.alerts.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Alertas de regressão");
        for alert in &outcome.alerts {
            let _ = writeln!(output, "- {}", alert.message);
        }
    }

    output
}
