//! HTTP endpoint for triggering calculations.
//!
//! `POST /api/calculate` with `{ "assessment_id": "<uuid>" }`.

use std::io::Cursor;

use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine;
use crate::error::EngineError;
use crate::models::CalculationResult;

#[derive(Debug, Deserialize)]
struct CalculateRequest {
    assessment_id: Uuid,
}

pub fn parse_calculate_request(body: &str) -> Result<Uuid, String> {
    serde_json::from_str::<CalculateRequest>(body)
        .map(|request| request.assessment_id)
        .map_err(|err| format!("invalid request body: {err}"))
}

pub fn outcome_response(outcome: Result<CalculationResult, EngineError>) -> (u16, Value) {
    match outcome {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(body) => (200, body),
            Err(err) => (500, json!({ "error": err.to_string() })),
        },
        Err(err) => (err.status_code(), json!({ "error": err.to_string() })),
    }
}

fn json_response(status: u16, body: &Value) -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_string(body.to_string()).with_status_code(status);
    match Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Serves requests until the listener closes. Blocks the calling thread; the
/// engine runs on `runtime`.
pub fn run(bind: &str, pool: PgPool, runtime: Handle) -> anyhow::Result<()> {
    let server =
        Server::http(bind).map_err(|err| anyhow::anyhow!("failed to bind {bind}: {err}"))?;
    info!(%bind, "calculation endpoint listening");

    for request in server.incoming_requests() {
        if let Err(err) = handle_request(request, &pool, &runtime) {
            warn!(error = %err, "failed to write response");
        }
    }

    Ok(())
}

fn handle_request(mut request: Request, pool: &PgPool, runtime: &Handle) -> std::io::Result<()> {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("/");

    if !(request.method() == &Method::Post && path == "/api/calculate") {
        let body = json!({ "error": format!("no route for {} {}", request.method(), path) });
        return request.respond(json_response(404, &body));
    }

    let mut body = String::new();
    request.as_reader().read_to_string(&mut body)?;

    let (status, payload) = match parse_calculate_request(&body) {
        Ok(assessment_id) => {
            let outcome = runtime
                .block_on(engine::calculate(pool, assessment_id))
                .map(|outcome| outcome.result);
            if let Err(err) = &outcome {
                if err.status_code() >= 500 {
                    error!(%assessment_id, error = %err, "calculation failed");
                } else {
                    warn!(%assessment_id, error = %err, "calculation rejected");
                }
            }
            outcome_response(outcome)
        }
        Err(message) => (400, json!({ "error": message })),
    };

    request.respond(json_response(status, &payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pillar, PillarScore, Severity};

    #[test]
    fn parses_assessment_id_from_body() {
        let id = Uuid::new_v4();
        let body = format!("{{\"assessment_id\":\"{id}\"}}");
        assert_eq!(parse_calculate_request(&body), Ok(id));
    }

    #[test]
    fn rejects_malformed_body() {
        let err = parse_calculate_request("{\"assessment_id\":\"nope\"}").unwrap_err();
        assert!(err.starts_with("invalid request body"));
        assert!(parse_calculate_request("").is_err());
    }

    #[test]
    fn success_body_carries_summary_fields() {
        let result = CalculationResult {
            success: true,
            assessment_id: Uuid::nil(),
            pillar_scores: vec![PillarScore {
                pillar: Pillar::Ra,
                score: 0.3,
                severity: Severity::Critico,
            }],
            critical_pillar: Some(Pillar::Ra),
            critical_score: Some(0.3),
            issues_created: 1,
            recommendations_created: 2,
        };

        let (status, body) = outcome_response(Ok(result));
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["critical_pillar"], "RA");
        assert_eq!(body["pillar_scores"][0]["severity"], "CRITICO");
        assert_eq!(body["issues_created"], 1);
        assert_eq!(body["recommendations_created"], 2);
    }

    #[test]
    fn errors_map_to_status_and_message() {
        let (status, body) = outcome_response(Err(EngineError::NoIndicatorData(Uuid::nil())));
        assert_eq!(status, 422);
        assert!(body["error"].as_str().unwrap().contains("fill in data first"));

        let (status, _) = outcome_response(Err(EngineError::AssessmentNotFound(Uuid::nil())));
        assert_eq!(status, 404);
    }
}
