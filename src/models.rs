use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A code read from storage that does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Top-level dimension of the diagnostic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pillar {
    /// Environmental relations.
    Ra,
    /// Structural organization.
    Oe,
    /// Operational actions.
    Ao,
}

impl Pillar {
    pub fn code(self) -> &'static str {
        match self {
            Pillar::Ra => "RA",
            Pillar::Oe => "OE",
            Pillar::Ao => "AO",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Pillar::Ra => "Relações Ambientais",
            Pillar::Oe => "Organização Estrutural",
            Pillar::Ao => "Ações Operacionais",
        }
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Pillar {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RA" => Ok(Pillar::Ra),
            "OE" => Ok(Pillar::Oe),
            "AO" => Ok(Pillar::Ao),
            _ => Err(UnknownVariant::new("pillar", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    HighIsBetter,
    LowIsBetter,
}

impl FromStr for Direction {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "HIGH_IS_BETTER" => Ok(Direction::HighIsBetter),
            "LOW_IS_BETTER" => Ok(Direction::LowIsBetter),
            _ => Err(UnknownVariant::new("direction", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Normalization {
    MinMax,
    Bands,
    Binary,
}

impl FromStr for Normalization {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "MIN_MAX" => Ok(Normalization::MinMax),
            "BANDS" => Ok(Normalization::Bands),
            "BINARY" => Ok(Normalization::Binary),
            _ => Err(UnknownVariant::new("normalization", value)),
        }
    }
}

/// Three-tier classification of a score. Ordered most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critico,
    Moderado,
    Bom,
}

impl Severity {
    pub fn code(self) -> &'static str {
        match self {
            Severity::Critico => "CRITICO",
            Severity::Moderado => "MODERADO",
            Severity::Bom => "BOM",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Critico => "Crítico",
            Severity::Moderado => "Moderado",
            Severity::Bom => "Bom",
        }
    }
}

/// Why a theme is underperforming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpretation {
    Estrutural,
    Gestao,
    Entrega,
}

impl Interpretation {
    pub fn code(self) -> &'static str {
        match self {
            Interpretation::Estrutural => "ESTRUTURAL",
            Interpretation::Gestao => "GESTAO",
            Interpretation::Entrega => "ENTREGA",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Interpretation::Estrutural => "Estrutural",
            Interpretation::Gestao => "Gestão",
            Interpretation::Entrega => "Entrega",
        }
    }

    /// Role responsible for remediation.
    pub fn target_agent(self) -> TargetAgent {
        match self {
            Interpretation::Estrutural => TargetAgent::Gestores,
            Interpretation::Gestao => TargetAgent::Tecnicos,
            Interpretation::Entrega => TargetAgent::Trade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetAgent {
    Gestores,
    Tecnicos,
    Trade,
}

impl TargetAgent {
    pub fn code(self) -> &'static str {
        match self {
            TargetAgent::Gestores => "GESTORES",
            TargetAgent::Tecnicos => "TECNICOS",
            TargetAgent::Trade => "TRADE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    Draft,
    DataReady,
    Calculated,
}

impl AssessmentStatus {
    pub fn code(self) -> &'static str {
        match self {
            AssessmentStatus::Draft => "DRAFT",
            AssessmentStatus::DataReady => "DATA_READY",
            AssessmentStatus::Calculated => "CALCULATED",
        }
    }
}

impl FromStr for AssessmentStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "DRAFT" => Ok(AssessmentStatus::Draft),
            "DATA_READY" => Ok(AssessmentStatus::DataReady),
            "CALCULATED" => Ok(AssessmentStatus::Calculated),
            _ => Err(UnknownVariant::new("assessment status", value)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assessment {
    pub id: Uuid,
    pub destination_id: Uuid,
    pub status: AssessmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry for one indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorDefinition {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub pillar: Pillar,
    pub theme: String,
    pub direction: Direction,
    pub normalization: Normalization,
    pub min_ref: Option<f64>,
    pub max_ref: Option<f64>,
    pub weight: f64,
}

/// A raw measurement joined with the definition it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorValue {
    pub definition: IndicatorDefinition,
    pub value_raw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorScore {
    pub indicator_id: Uuid,
    pub code: String,
    pub name: String,
    pub pillar: Pillar,
    pub theme: String,
    pub score: f64,
    pub min_ref_used: Option<f64>,
    pub max_ref_used: Option<f64>,
    pub weight_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PillarScore {
    pub pillar: Pillar,
    pub score: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceIndicator {
    pub name: String,
    pub code: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub indicators: Vec<EvidenceIndicator>,
    pub theme_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub pillar: Pillar,
    pub theme: String,
    pub severity: Severity,
    pub interpretation: Interpretation,
    pub title: String,
    pub evidence: Evidence,
}

/// Legacy (pillar, theme) tag on a course record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseTag {
    pub pillar: Pillar,
    pub theme: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseOffering {
    pub id: Uuid,
    pub title: String,
    pub pillar: Option<Pillar>,
    pub tags: Vec<CourseTag>,
    /// Instructional level, lower is more basic.
    pub level: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prescription {
    /// Index into the issue list produced by the same run.
    pub issue_index: usize,
    pub course_id: Uuid,
    pub course_title: String,
    pub pillar: Pillar,
    pub status: Severity,
    pub interpretation: Interpretation,
    pub justification: String,
    pub target_agent: TargetAgent,
    pub priority: i32,
}

/// Flattened prescription kept for the simpler recommendations consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub course_id: Uuid,
    pub description: String,
    pub priority: i32,
}

/// Pillar scores of one earlier calculated assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalCycle {
    pub assessment_id: Uuid,
    pub scores: std::collections::BTreeMap<Pillar, f64>,
}

/// Instruction to create or refresh the undismissed regression alert for a pillar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertUpsert {
    pub pillar: Pillar,
    pub consecutive_cycles: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionAlert {
    pub id: Uuid,
    pub destination_id: Uuid,
    pub assessment_id: Uuid,
    pub pillar: Pillar,
    pub consecutive_cycles: i32,
    pub message: String,
    pub is_read: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    pub success: bool,
    pub assessment_id: Uuid,
    pub pillar_scores: Vec<PillarScore>,
    pub critical_pillar: Option<Pillar>,
    pub critical_score: Option<f64>,
    pub issues_created: usize,
    pub recommendations_created: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pillar_codes_round_trip_case_insensitively() {
        assert_eq!("ra".parse::<Pillar>().unwrap(), Pillar::Ra);
        assert_eq!(" OE ".parse::<Pillar>().unwrap(), Pillar::Oe);
        let err = "XX".parse::<Pillar>().unwrap_err();
        assert_eq!(err.to_string(), "unknown pillar `XX`");
    }

    #[test]
    fn target_agent_follows_interpretation() {
        assert_eq!(
            Interpretation::Estrutural.target_agent(),
            TargetAgent::Gestores
        );
        assert_eq!(Interpretation::Gestao.target_agent(), TargetAgent::Tecnicos);
        assert_eq!(Interpretation::Entrega.target_agent(), TargetAgent::Trade);
    }

    #[test]
    fn enums_serialize_as_storage_codes() {
        assert_eq!(serde_json::to_string(&Pillar::Ao).unwrap(), "\"AO\"");
        assert_eq!(
            serde_json::to_string(&Severity::Critico).unwrap(),
            "\"CRITICO\""
        );
        assert_eq!(
            serde_json::to_string(&Direction::LowIsBetter).unwrap(),
            "\"LOW_IS_BETTER\""
        );
        assert_eq!(
            serde_json::to_string(&Normalization::MinMax).unwrap(),
            "\"MIN_MAX\""
        );
        assert_eq!(
            serde_json::to_string(&TargetAgent::Trade).unwrap(),
            "\"TRADE\""
        );
    }

    #[test]
    fn severity_orders_most_severe_first() {
        assert!(Severity::Critico < Severity::Moderado);
        assert!(Severity::Moderado < Severity::Bom);
    }
}
