use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::engine::DerivedState;
use crate::error::EngineError;
use crate::models::{
    AlertUpsert, Assessment, AssessmentStatus, CalculationResult, CourseOffering, CourseTag,
    HistoricalCycle, IndicatorDefinition, IndicatorValue, Pillar, RegressionAlert,
};
use crate::regression::ALERT_TYPE;

pub const AUDIT_EVENT_CALCULATED: &str = "assessment_calculated";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Advisory lock key for one assessment, derived from the high half of its id.
pub fn lock_key(assessment_id: Uuid) -> i64 {
    let (high, _) = assessment_id.as_u64_pair();
    high as i64
}

/// Serializes calculations of the same assessment until the transaction ends.
pub async fn lock_assessment(
    conn: &mut PgConnection,
    assessment_id: Uuid,
) -> Result<(), EngineError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(lock_key(assessment_id))
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_assessment(
    conn: &mut PgConnection,
    assessment_id: Uuid,
) -> Result<Option<Assessment>, EngineError> {
    let row = sqlx::query(
        "SELECT id, destination_id, status, created_at \
         FROM destination_diagnostic.assessments WHERE id = $1",
    )
    .bind(assessment_id)
    .fetch_optional(conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(Assessment {
        id: row.get("id"),
        destination_id: row.get("destination_id"),
        status: row.get::<String, _>("status").parse()?,
        created_at: row.get("created_at"),
    }))
}

pub async fn fetch_indicator_values(
    conn: &mut PgConnection,
    assessment_id: Uuid,
) -> Result<Vec<IndicatorValue>, EngineError> {
    let rows = sqlx::query(
        "SELECT i.id, i.code, i.name, i.pillar, i.theme, i.direction, i.normalization, \
         i.min_ref, i.max_ref, i.weight, v.value_raw \
         FROM destination_diagnostic.indicator_values v \
         JOIN destination_diagnostic.indicators i ON i.id = v.indicator_id \
         WHERE v.assessment_id = $1 \
         ORDER BY i.code",
    )
    .bind(assessment_id)
    .fetch_all(conn)
    .await?;

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        values.push(IndicatorValue {
            definition: IndicatorDefinition {
                id: row.get("id"),
                code: row.get("code"),
                name: row.get("name"),
                pillar: row.get::<String, _>("pillar").parse()?,
                theme: row.get("theme"),
                direction: row.get::<String, _>("direction").parse()?,
                normalization: row.get::<String, _>("normalization").parse()?,
                min_ref: row.get("min_ref"),
                max_ref: row.get("max_ref"),
                weight: row.get("weight"),
            },
            value_raw: row.get("value_raw"),
        });
    }

    Ok(values)
}

#[derive(serde::Deserialize)]
struct StoredTag {
    pillar: String,
    theme: String,
}

pub async fn fetch_courses(conn: &mut PgConnection) -> Result<Vec<CourseOffering>, EngineError> {
    let rows = sqlx::query(
        "SELECT id, title, pillar, tags, level FROM destination_diagnostic.courses ORDER BY title",
    )
    .fetch_all(conn)
    .await?;

    let mut courses = Vec::with_capacity(rows.len());
    for row in rows {
        let pillar = match row.get::<Option<String>, _>("pillar") {
            Some(code) => Some(code.parse::<Pillar>()?),
            None => None,
        };
        let Json(stored): Json<Vec<StoredTag>> = row.try_get("tags")?;
        let mut tags = Vec::with_capacity(stored.len());
        for tag in stored {
            tags.push(CourseTag {
                pillar: tag.pillar.parse()?,
                theme: tag.theme,
            });
        }

        courses.push(CourseOffering {
            id: row.get("id"),
            title: row.get("title"),
            pillar,
            tags,
            level: row.get("level"),
        });
    }

    Ok(courses)
}

/// Deletes every derived row of the assessment, dependents first, then inserts
/// the new state. Must run inside the calculation transaction.
pub async fn replace_derived(
    conn: &mut PgConnection,
    assessment_id: Uuid,
    derived: &DerivedState,
) -> Result<(), EngineError> {
    for table in [
        "prescriptions",
        "recommendations",
        "issues",
        "pillar_scores",
        "indicator_scores",
    ] {
        sqlx::query(&format!(
            "DELETE FROM destination_diagnostic.{table} WHERE assessment_id = $1"
        ))
        .bind(assessment_id)
        .execute(&mut *conn)
        .await?;
    }

    for score in &derived.indicator_scores {
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.indicator_scores
            (id, assessment_id, indicator_id, score, min_ref_used, max_ref_used, weight_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment_id)
        .bind(score.indicator_id)
        .bind(score.score)
        .bind(score.min_ref_used)
        .bind(score.max_ref_used)
        .bind(score.weight_used)
        .execute(&mut *conn)
        .await?;
    }

    for pillar in &derived.pillar_scores {
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.pillar_scores
            (id, assessment_id, pillar, score, severity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment_id)
        .bind(pillar.pillar.code())
        .bind(pillar.score)
        .bind(pillar.severity.code())
        .execute(&mut *conn)
        .await?;
    }

    let mut issue_ids = Vec::with_capacity(derived.issues.len());
    for (rank, issue) in derived.issues.iter().enumerate() {
        let issue_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.issues
            (id, assessment_id, pillar, theme, severity, interpretation, title, evidence, rank)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(issue_id)
        .bind(assessment_id)
        .bind(issue.pillar.code())
        .bind(&issue.theme)
        .bind(issue.severity.code())
        .bind(issue.interpretation.code())
        .bind(&issue.title)
        .bind(Json(&issue.evidence))
        .bind(rank as i32 + 1)
        .execute(&mut *conn)
        .await?;
        issue_ids.push(issue_id);
    }

    for prescription in &derived.prescriptions {
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.prescriptions
            (id, assessment_id, issue_id, course_id, pillar, status, interpretation,
             justification, target_agent, priority)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment_id)
        .bind(issue_ids[prescription.issue_index])
        .bind(prescription.course_id)
        .bind(prescription.pillar.code())
        .bind(prescription.status.code())
        .bind(prescription.interpretation.code())
        .bind(&prescription.justification)
        .bind(prescription.target_agent.code())
        .bind(prescription.priority)
        .execute(&mut *conn)
        .await?;
    }

    for recommendation in &derived.recommendations {
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.recommendations
            (id, assessment_id, course_id, description, priority)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment_id)
        .bind(recommendation.course_id)
        .bind(&recommendation.description)
        .bind(recommendation.priority)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn mark_calculated(
    conn: &mut PgConnection,
    assessment_id: Uuid,
) -> Result<(), EngineError> {
    sqlx::query(
        "UPDATE destination_diagnostic.assessments \
         SET status = $2, calculated_at = now() WHERE id = $1",
    )
    .bind(assessment_id)
    .bind(AssessmentStatus::Calculated.code())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn record_audit_event(
    conn: &mut PgConnection,
    result: &CalculationResult,
) -> Result<(), EngineError> {
    let payload = serde_json::json!({
        "pillar_scores": result.pillar_scores,
        "critical_pillar": result.critical_pillar,
        "critical_score": result.critical_score,
        "issues_created": result.issues_created,
        "recommendations_created": result.recommendations_created,
    });

    sqlx::query(
        r#"
        INSERT INTO destination_diagnostic.audit_events (id, event_type, entity_id, payload)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(AUDIT_EVENT_CALCULATED)
    .bind(result.assessment_id)
    .bind(Json(payload))
    .execute(conn)
    .await?;
    Ok(())
}

/// Whether an assessment created at `created_at` with `id` is an earlier cycle
/// than `current`. Assessments created at the same instant are ordered by id,
/// matching Postgres' byte order for `uuid`.
pub fn precedes(created_at: DateTime<Utc>, id: Uuid, current: &Assessment) -> bool {
    (created_at, id) < (current.created_at, current.id)
}

/// Earlier calculated cycles of the destination, newest first.
pub async fn fetch_history(
    pool: &PgPool,
    assessment: &Assessment,
) -> Result<Vec<HistoricalCycle>, EngineError> {
    let rows = sqlx::query(
        "SELECT a.id, a.created_at, ps.pillar, ps.score \
         FROM destination_diagnostic.assessments a \
         JOIN destination_diagnostic.pillar_scores ps ON ps.assessment_id = a.id \
         WHERE a.destination_id = $1 AND a.status = $3 AND a.created_at <= $2 \
         ORDER BY a.created_at DESC, a.id DESC",
    )
    .bind(assessment.destination_id)
    .bind(assessment.created_at)
    .bind(AssessmentStatus::Calculated.code())
    .fetch_all(pool)
    .await?;

    let mut history: Vec<HistoricalCycle> = Vec::new();
    for row in rows {
        let id: Uuid = row.get("id");
        if !precedes(row.get("created_at"), id, assessment) {
            continue;
        }
        let pillar: Pillar = row.get::<String, _>("pillar").parse()?;
        let score: f64 = row.get("score");

        match history.last_mut() {
            Some(cycle) if cycle.assessment_id == id => {
                cycle.scores.insert(pillar, score);
            }
            _ => history.push(HistoricalCycle {
                assessment_id: id,
                scores: [(pillar, score)].into_iter().collect(),
            }),
        }
    }

    Ok(history)
}

/// Refreshes the undismissed alert for each pillar or opens a new one.
/// Dismissed alerts are never touched.
pub async fn upsert_alerts(
    pool: &PgPool,
    assessment: &Assessment,
    alerts: &[AlertUpsert],
) -> Result<(), EngineError> {
    let mut tx = pool.begin().await?;

    for alert in alerts {
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.regression_alerts
            (id, destination_id, assessment_id, pillar, alert_type, consecutive_cycles, message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (destination_id, pillar, alert_type) WHERE NOT dismissed
            DO UPDATE SET consecutive_cycles = EXCLUDED.consecutive_cycles,
                          assessment_id = EXCLUDED.assessment_id,
                          message = EXCLUDED.message,
                          is_read = false,
                          updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment.destination_id)
        .bind(assessment.id)
        .bind(alert.pillar.code())
        .bind(ALERT_TYPE)
        .bind(alert.consecutive_cycles)
        .bind(&alert.message)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn fetch_open_alerts(
    pool: &PgPool,
    destination_id: Uuid,
) -> anyhow::Result<Vec<RegressionAlert>> {
    let rows = sqlx::query(
        "SELECT id, destination_id, assessment_id, pillar, consecutive_cycles, message, \
         is_read, updated_at \
         FROM destination_diagnostic.regression_alerts \
         WHERE destination_id = $1 AND alert_type = $2 AND NOT dismissed \
         ORDER BY updated_at DESC",
    )
    .bind(destination_id)
    .bind(ALERT_TYPE)
    .fetch_all(pool)
    .await?;

    let mut alerts = Vec::with_capacity(rows.len());
    for row in rows {
        alerts.push(RegressionAlert {
            id: row.get("id"),
            destination_id: row.get("destination_id"),
            assessment_id: row.get("assessment_id"),
            pillar: row.get::<String, _>("pillar").parse()?,
            consecutive_cycles: row.get("consecutive_cycles"),
            message: row.get("message"),
            is_read: row.get("is_read"),
            updated_at: row.get("updated_at"),
        });
    }

    Ok(alerts)
}

pub const SEED_DESTINATION_ID: &str = "6b1f0c52-8a43-4d0e-9c55-2f6f8d1e7a10";
pub const SEED_ASSESSMENT_ID: &str = "f3a9d2e4-51b7-4c8a-a0d6-7e2b9c4f1d35";

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let destination_id = Uuid::parse_str(SEED_DESTINATION_ID)?;
    let assessment_id = Uuid::parse_str(SEED_ASSESSMENT_ID)?;
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO destination_diagnostic.destinations (id, name, state)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, state = EXCLUDED.state
        "#,
    )
    .bind(destination_id)
    .bind("Serra Azul")
    .bind("MG")
    .execute(&mut *tx)
    .await?;

    // (code, name, pillar, theme, direction, normalization, min_ref, max_ref, weight)
    let indicators = vec![
        (
            "RA-AMB-01",
            "Domicílios com saneamento básico (%)",
            "RA",
            "ambiental",
            "HIGH_IS_BETTER",
            "MIN_MAX",
            Some(0.0),
            Some(100.0),
            1.0,
        ),
        (
            "RA-AMB-02",
            "Unidade de conservação com plano de manejo",
            "RA",
            "ambiental",
            "HIGH_IS_BETTER",
            "BINARY",
            None,
            None,
            1.0,
        ),
        (
            "RA-CUL-01",
            "Bens culturais inventariados (índice)",
            "RA",
            "cultural",
            "HIGH_IS_BETTER",
            "BANDS",
            None,
            None,
            0.5,
        ),
        (
            "RA-SOC-01",
            "Taxa de desemprego (%)",
            "RA",
            "social",
            "LOW_IS_BETTER",
            "MIN_MAX",
            Some(0.0),
            Some(30.0),
            1.0,
        ),
        (
            "RA-ECO-01",
            "Participação do turismo no PIB (%)",
            "RA",
            "econômico",
            "HIGH_IS_BETTER",
            "MIN_MAX",
            Some(0.0),
            Some(20.0),
            1.5,
        ),
        (
            "OE-INF-01",
            "Leitos hospitalares por mil habitantes",
            "OE",
            "infraestrutura",
            "HIGH_IS_BETTER",
            "MIN_MAX",
            Some(0.0),
            Some(5.0),
            1.0,
        ),
        (
            "OE-INF-02",
            "Acesso rodoviário pavimentado",
            "OE",
            "infraestrutura",
            "HIGH_IS_BETTER",
            "BINARY",
            None,
            None,
            1.0,
        ),
        (
            "OE-GOV-01",
            "Conselho municipal de turismo ativo",
            "OE",
            "governança",
            "HIGH_IS_BETTER",
            "BINARY",
            None,
            None,
            2.0,
        ),
        (
            "OE-GOV-02",
            "Execução do plano municipal de turismo (índice)",
            "OE",
            "governança",
            "HIGH_IS_BETTER",
            "BANDS",
            None,
            None,
            1.0,
        ),
        (
            "AO-OFE-01",
            "Meios de hospedagem cadastrados",
            "AO",
            "oferta",
            "HIGH_IS_BETTER",
            "MIN_MAX",
            Some(0.0),
            Some(200.0),
            1.0,
        ),
        (
            "AO-DEM-01",
            "Taxa média de ocupação (%)",
            "AO",
            "demanda",
            "HIGH_IS_BETTER",
            "MIN_MAX",
            Some(0.0),
            Some(100.0),
            1.0,
        ),
        (
            "AO-MKT-01",
            "Presença digital do destino (índice)",
            "AO",
            "marketing",
            "HIGH_IS_BETTER",
            "BANDS",
            None,
            None,
            1.0,
        ),
        (
            "AO-MER-01",
            "Satisfação do visitante (0-10)",
            "AO",
            "mercado",
            "HIGH_IS_BETTER",
            "MIN_MAX",
            Some(0.0),
            Some(10.0),
            1.0,
        ),
    ];

    for (code, name, pillar, theme, direction, normalization, min_ref, max_ref, weight) in
        indicators
    {
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.indicators
            (id, code, name, pillar, theme, direction, normalization, min_ref, max_ref, weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, pillar = EXCLUDED.pillar, theme = EXCLUDED.theme,
                direction = EXCLUDED.direction, normalization = EXCLUDED.normalization,
                min_ref = EXCLUDED.min_ref, max_ref = EXCLUDED.max_ref, weight = EXCLUDED.weight
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(name)
        .bind(pillar)
        .bind(theme)
        .bind(direction)
        .bind(normalization)
        .bind(min_ref)
        .bind(max_ref)
        .bind(weight)
        .execute(&mut *tx)
        .await?;
    }

    let courses = vec![
        (
            "Fundamentos de gestão ambiental no turismo",
            Some("RA"),
            serde_json::json!([]),
            1,
        ),
        (
            "Turismo de base comunitária",
            Some("RA"),
            serde_json::json!([]),
            2,
        ),
        (
            "Planejamento de infraestrutura turística",
            Some("OE"),
            serde_json::json!([]),
            1,
        ),
        (
            "Governança e conselhos municipais de turismo",
            Some("OE"),
            serde_json::json!([]),
            2,
        ),
        (
            "Qualidade no atendimento ao visitante",
            Some("AO"),
            serde_json::json!([]),
            1,
        ),
        (
            "Marketing digital para destinos",
            None,
            serde_json::json!([{ "pillar": "AO", "theme": "marketing" }]),
            2,
        ),
    ];

    for (title, pillar, tags, level) in courses {
        sqlx::query(
            r#"
            INSERT INTO destination_diagnostic.courses (id, title, pillar, tags, level)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (title) DO UPDATE
            SET pillar = EXCLUDED.pillar, tags = EXCLUDED.tags, level = EXCLUDED.level
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(pillar)
        .bind(Json(tags))
        .bind(level)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO destination_diagnostic.assessments (id, destination_id, title, status)
        VALUES ($1, $2, $3, 'DATA_READY')
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(assessment_id)
    .bind(destination_id)
    .bind("Diagnóstico 2026")
    .execute(&mut *tx)
    .await?;

    let values = vec![
        ("RA-AMB-01", Some(42.0)),
        ("RA-AMB-02", Some(0.0)),
        ("RA-CUL-01", Some(0.45)),
        ("RA-SOC-01", Some(12.0)),
        ("RA-ECO-01", Some(6.5)),
        ("OE-INF-01", Some(1.2)),
        ("OE-INF-02", Some(1.0)),
        ("OE-GOV-01", Some(1.0)),
        ("OE-GOV-02", Some(0.6)),
        ("AO-OFE-01", Some(35.0)),
        ("AO-DEM-01", None),
        ("AO-MKT-01", Some(0.25)),
        ("AO-MER-01", Some(8.1)),
    ];

    for (code, value_raw) in values {
        upsert_value(&mut tx, assessment_id, code, value_raw)
            .await?
            .with_context(|| format!("seed indicator {code} missing from catalog"))?;
    }

    tx.commit().await?;
    Ok(())
}

/// Stores one raw value. Returns `None` when the indicator code is unknown.
async fn upsert_value(
    conn: &mut PgConnection,
    assessment_id: Uuid,
    indicator_code: &str,
    value_raw: Option<f64>,
) -> anyhow::Result<Option<()>> {
    let indicator_id: Option<Uuid> =
        sqlx::query("SELECT id FROM destination_diagnostic.indicators WHERE code = $1")
            .bind(indicator_code)
            .fetch_optional(&mut *conn)
            .await?
            .map(|row| row.get("id"));

    let Some(indicator_id) = indicator_id else {
        return Ok(None);
    };

    sqlx::query(
        r#"
        INSERT INTO destination_diagnostic.indicator_values
        (id, assessment_id, indicator_id, value_raw)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (assessment_id, indicator_id) DO UPDATE
        SET value_raw = EXCLUDED.value_raw, updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(assessment_id)
    .bind(indicator_id)
    .bind(value_raw)
    .execute(&mut *conn)
    .await?;

    Ok(Some(()))
}

#[derive(Debug, serde::Deserialize)]
pub struct ValueRow {
    pub indicator_code: String,
    pub value_raw: Option<f64>,
}

/// Parses `indicator_code,value_raw` rows, pairing each with its file line.
pub fn read_value_rows(csv_path: &std::path::Path) -> anyhow::Result<Vec<(u64, ValueRow)>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: ValueRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("invalid row on line {line} of {}", csv_path.display()))?;
        if let Some(value) = row.value_raw.filter(|v| !v.is_finite()) {
            anyhow::bail!(
                "non-finite value `{value}` on line {line} of {}",
                csv_path.display()
            );
        }
        rows.push((line, row));
    }

    Ok(rows)
}

pub async fn import_csv(
    pool: &PgPool,
    assessment_id: Uuid,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let rows = read_value_rows(csv_path)?;
    let mut tx = pool.begin().await?;

    fetch_assessment(&mut tx, assessment_id)
        .await?
        .with_context(|| format!("assessment {assessment_id} not found"))?;

    for (line, row) in &rows {
        upsert_value(&mut tx, assessment_id, &row.indicator_code, row.value_raw)
            .await?
            .with_context(|| {
                format!(
                    "unknown indicator code `{}` on line {line} of {}",
                    row.indicator_code,
                    csv_path.display()
                )
            })?;
    }

    sqlx::query(
        "UPDATE destination_diagnostic.assessments SET status = $2 \
         WHERE id = $1 AND status = $3",
    )
    .bind(assessment_id)
    .bind(AssessmentStatus::DataReady.code())
    .bind(AssessmentStatus::Draft.code())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lock_key_is_stable_per_assessment() {
        let id = Uuid::parse_str(SEED_ASSESSMENT_ID).unwrap();
        assert_eq!(lock_key(id), lock_key(id));
        let other = Uuid::parse_str(SEED_DESTINATION_ID).unwrap();
        assert_ne!(lock_key(id), lock_key(other));
    }

    #[test]
    fn history_includes_earlier_assessments_created_at_the_same_instant() {
        let created_at = Utc::now();
        let current = Assessment {
            id: Uuid::from_u128(0x20),
            destination_id: Uuid::nil(),
            status: AssessmentStatus::Calculated,
            created_at,
        };

        assert!(precedes(created_at, Uuid::from_u128(0x10), &current));
        assert!(!precedes(created_at, current.id, &current));
        assert!(!precedes(created_at, Uuid::from_u128(0x30), &current));
        let earlier = created_at - chrono::Duration::seconds(1);
        assert!(precedes(earlier, Uuid::from_u128(0x30), &current));
        let later = created_at + chrono::Duration::seconds(1);
        assert!(!precedes(later, Uuid::from_u128(0x10), &current));
    }

    #[test]
    fn value_rows_accept_blank_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "indicator_code,value_raw").unwrap();
        writeln!(file, "RA-AMB-01,42.5").unwrap();
        writeln!(file, "AO-DEM-01,").unwrap();

        let rows = read_value_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.indicator_code, "RA-AMB-01");
        assert_eq!(rows[0].1.value_raw, Some(42.5));
        assert_eq!(rows[1].1.value_raw, None);
        assert_eq!(rows[1].0, 3);
    }

    #[test]
    fn value_rows_reject_non_numeric_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "indicator_code,value_raw").unwrap();
        writeln!(file, "RA-AMB-01,abc").unwrap();

        assert!(read_value_rows(file.path()).is_err());
    }

    #[test]
    fn value_rows_reject_non_finite_values() {
        for raw in ["NaN", "inf", "-inf"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "indicator_code,value_raw").unwrap();
            writeln!(file, "RA-AMB-01,1.0").unwrap();
            writeln!(file, "RA-CUL-01,{raw}").unwrap();

            let err = read_value_rows(file.path()).unwrap_err().to_string();
            assert!(err.contains("non-finite"), "{raw}: {err}");
            assert!(err.contains("line 3"), "{raw}: {err}");
        }
    }
}
