use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate;
use crate::db;
use crate::error::EngineError;
use crate::issues;
use crate::models::{
    AlertUpsert, AssessmentStatus, CalculationResult, CourseOffering, IndicatorScore,
    IndicatorValue, Issue, PillarScore, Prescription, Recommendation,
};
use crate::normalize;
use crate::prescription;
use crate::regression;

/// Everything one calculation writes for an assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedState {
    pub indicator_scores: Vec<IndicatorScore>,
    pub pillar_scores: Vec<PillarScore>,
    pub issues: Vec<Issue>,
    pub prescriptions: Vec<Prescription>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone)]
pub struct CalculationOutcome {
    pub result: CalculationResult,
    pub derived: DerivedState,
    pub alerts: Vec<AlertUpsert>,
}

/// Runs normalizer, aggregator, detector and generator in order.
pub fn derive(values: &[IndicatorValue], catalog: &[CourseOffering]) -> DerivedState {
    let indicator_scores = normalize::score_indicators(values);
    let pillar_scores = aggregate::aggregate_pillars(&indicator_scores);
    let issues = issues::detect_issues(&indicator_scores);
    let prescriptions = prescription::prescribe(&issues, catalog);
    let recommendations = prescription::flatten(&prescriptions);

    DerivedState {
        indicator_scores,
        pillar_scores,
        issues,
        prescriptions,
        recommendations,
    }
}

pub fn summarize(assessment_id: Uuid, derived: &DerivedState) -> CalculationResult {
    let critical = aggregate::critical_pillar(&derived.pillar_scores);
    CalculationResult {
        success: true,
        assessment_id,
        pillar_scores: derived.pillar_scores.clone(),
        critical_pillar: critical.map(|p| p.pillar),
        critical_score: critical.map(|p| p.score),
        issues_created: derived.issues.len(),
        recommendations_created: derived.recommendations.len(),
    }
}

/// Recomputes all derived state of an assessment.
///
/// Reads and the delete-then-insert replacement run in one transaction holding
/// an advisory lock on the assessment, so concurrent calls for the same id are
/// serialized and a failure leaves the previous state intact. Regression
/// alerts belong to the destination and are upserted in a second transaction
/// once the first has committed.
pub async fn calculate(
    pool: &PgPool,
    assessment_id: Uuid,
) -> Result<CalculationOutcome, EngineError> {
    let mut tx = pool.begin().await?;
    db::lock_assessment(&mut tx, assessment_id).await?;

    let assessment = db::fetch_assessment(&mut tx, assessment_id)
        .await?
        .ok_or(EngineError::AssessmentNotFound(assessment_id))?;
    if assessment.status == AssessmentStatus::Draft {
        warn!(%assessment_id, "calculating an assessment still in draft");
    }
    let values = db::fetch_indicator_values(&mut tx, assessment_id).await?;
    if values.is_empty() {
        return Err(EngineError::NoIndicatorData(assessment_id));
    }
    let catalog = db::fetch_courses(&mut tx).await?;
    debug!(
        %assessment_id,
        values = values.len(),
        courses = catalog.len(),
        "loaded calculation inputs"
    );

    let derived = derive(&values, &catalog);
    let result = summarize(assessment_id, &derived);

    db::replace_derived(&mut tx, assessment_id, &derived).await?;
    db::mark_calculated(&mut tx, assessment_id).await?;
    db::record_audit_event(&mut tx, &result).await?;
    tx.commit().await?;

    info!(
        %assessment_id,
        pillars = result.pillar_scores.len(),
        critical_pillar = ?result.critical_pillar,
        issues = result.issues_created,
        recommendations = result.recommendations_created,
        "assessment calculated"
    );

    let history = db::fetch_history(pool, &assessment).await?;
    let alerts = regression::detect_regressions(&derived.pillar_scores, &history);
    db::upsert_alerts(pool, &assessment, &alerts).await?;
    for alert in &alerts {
        info!(
            destination_id = %assessment.destination_id,
            pillar = %alert.pillar,
            cycles = alert.consecutive_cycles,
            "regression alert raised"
        );
    }

    Ok(CalculationOutcome {
        result,
        derived,
        alerts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Direction, IndicatorDefinition, Interpretation, Normalization, Pillar, Severity,
        TargetAgent,
    };

    fn value(code: &str, pillar: Pillar, theme: &str, raw: Option<f64>) -> IndicatorValue {
        IndicatorValue {
            definition: IndicatorDefinition {
                id: Uuid::from_u128(code.bytes().map(u128::from).sum()),
                code: code.to_string(),
                name: format!("Indicador {code}"),
                pillar,
                theme: theme.to_string(),
                direction: Direction::HighIsBetter,
                normalization: Normalization::MinMax,
                min_ref: Some(0.0),
                max_ref: Some(100.0),
                weight: 1.0,
            },
            value_raw: raw,
        }
    }

    fn course(title: &str, pillar: Pillar, level: i32) -> CourseOffering {
        CourseOffering {
            id: Uuid::from_u128(title.len() as u128),
            title: title.to_string(),
            pillar: Some(pillar),
            tags: Vec::new(),
            level,
        }
    }

    #[test]
    fn critical_environmental_theme_yields_one_prescription_for_managers() {
        let values = vec![
            value("RA-01", Pillar::Ra, "ambiental", Some(20.0)),
            value("RA-02", Pillar::Ra, "ambiental", Some(40.0)),
        ];
        let catalog = vec![course("Gestão ambiental", Pillar::Ra, 1)];

        let derived = derive(&values, &catalog);

        assert_eq!(derived.pillar_scores.len(), 1);
        assert_eq!(derived.pillar_scores[0].severity, Severity::Critico);

        assert_eq!(derived.issues.len(), 1);
        let issue = &derived.issues[0];
        assert_eq!(issue.pillar, Pillar::Ra);
        assert_eq!(issue.theme, "ambiental");
        assert_eq!(issue.severity, Severity::Critico);
        assert_eq!(issue.interpretation, Interpretation::Estrutural);

        assert_eq!(derived.prescriptions.len(), 1);
        let prescription = &derived.prescriptions[0];
        assert_eq!(prescription.target_agent, TargetAgent::Gestores);
        for expected in ["ambiental", "Crítico", "Relações Ambientais", "Estrutural"] {
            assert!(prescription.justification.contains(expected));
        }
        assert_eq!(derived.recommendations.len(), 1);
    }

    #[test]
    fn derivation_is_deterministic_for_the_same_inputs() {
        let values = vec![
            value("RA-01", Pillar::Ra, "ambiental", Some(20.0)),
            value("OE-01", Pillar::Oe, "infraestrutura", Some(55.0)),
            value("OE-02", Pillar::Oe, "governança", None),
            value("AO-01", Pillar::Ao, "oferta", Some(90.0)),
        ];
        let catalog = vec![
            course("Infra", Pillar::Oe, 2),
            course("Gov", Pillar::Oe, 1),
            course("Ambiente", Pillar::Ra, 1),
        ];

        let first = derive(&values, &catalog);
        let second = derive(&values, &catalog);
        assert_eq!(first, second);
        assert_eq!(first.indicator_scores.len(), 4);
    }

    #[test]
    fn target_agent_depends_only_on_interpretation() {
        let values = vec![
            value("RA-01", Pillar::Ra, "social", Some(60.0)),
            value("OE-01", Pillar::Oe, "governança", Some(10.0)),
            value("AO-01", Pillar::Ao, "marketing", Some(10.0)),
        ];
        let catalog = vec![
            course("A", Pillar::Ra, 1),
            course("BB", Pillar::Oe, 1),
            course("CCC", Pillar::Ao, 1),
        ];

        let derived = derive(&values, &catalog);
        assert_eq!(derived.prescriptions.len(), 3);
        for prescription in &derived.prescriptions {
            assert_eq!(
                prescription.target_agent,
                prescription.interpretation.target_agent()
            );
        }
    }

    #[test]
    fn summary_names_lowest_pillar() {
        let values = vec![
            value("RA-01", Pillar::Ra, "ambiental", Some(90.0)),
            value("AO-01", Pillar::Ao, "oferta", Some(10.0)),
        ];
        let derived = derive(&values, &[]);
        let result = summarize(Uuid::nil(), &derived);

        assert!(result.success);
        assert_eq!(result.critical_pillar, Some(Pillar::Ao));
        assert_eq!(result.critical_score, Some(0.1));
        assert_eq!(result.issues_created, 1);
        assert_eq!(result.recommendations_created, 0);
    }
}
