//! Strict interpretation of model output.
//!
//! Model text is reduced to its first JSON object and validated against the
//! expected shape. Anything else is [`EngagementError::MalformedModelOutput`];
//! no partial result ever escapes.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;

use crate::error::{EngagementError, Result};
use crate::models::{AiResponse, Classification, CommentClassification};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("code fence pattern is valid"));

/// Slice out the first balanced `{ ... }` object of a model reply.
///
/// The reply is scanned as-is first; a Markdown code fence is only unwrapped
/// when that scan does not yield valid JSON, so backticks inside string
/// values are left alone.
pub fn extract_json_object(raw: &str) -> Result<&str> {
    let direct = balanced_object(raw);
    if let Ok(object) = direct {
        if serde_json::from_str::<IgnoredAny>(object).is_ok() {
            return Ok(object);
        }
    }

    match CODE_FENCE.captures(raw).and_then(|captures| captures.get(1)) {
        Some(fenced) => balanced_object(fenced.as_str()),
        None => direct,
    }
}

fn balanced_object(body: &str) -> Result<&str> {
    let start = body
        .find('{')
        .ok_or_else(|| EngagementError::malformed("no JSON object in model output"))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in body[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&body[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Err(EngagementError::malformed("unterminated JSON object in model output"))
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let object = extract_json_object(raw)?;
    serde_json::from_str(object).map_err(|e| EngagementError::malformed(e.to_string()))
}

/// Parse a free-form answer: `{content, confidence, sources, suggestedActions}`
pub fn parse_ai_response(raw: &str) -> Result<AiResponse> {
    let response: AiResponse = decode(raw)?;
    if !(0.0..=1.0).contains(&response.confidence) {
        return Err(EngagementError::malformed(format!(
            "confidence must be between 0 and 1, got {}",
            response.confidence
        )));
    }
    Ok(response)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassificationReply {
    classification: String,
    confidence: f64,
    justification: String,
    #[serde(default)]
    suggested_response: Option<String>,
    should_respond: bool,
    should_delete: bool,
}

/// Parse a comment classification; only approved, rejected and pending are
/// accepted
pub fn parse_comment_classification(raw: &str) -> Result<CommentClassification> {
    let reply: ClassificationReply = decode(raw)?;
    let classification = Classification::from_model_label(reply.classification.trim())?;

    if !reply.confidence.is_finite() || !(0.0..=100.0).contains(&reply.confidence) {
        return Err(EngagementError::malformed(format!(
            "confidence out of range: {}",
            reply.confidence
        )));
    }

    Ok(CommentClassification {
        classification,
        confidence: reply.confidence,
        justification: reply.justification,
        suggested_response: reply.suggested_response.filter(|text| !text.trim().is_empty()),
        should_respond: reply.should_respond,
        should_delete: reply.should_delete,
    })
}

#[derive(Deserialize)]
struct RecommendationsReply {
    recommendations: Vec<String>,
}

/// Parse `{recommendations: string[]}`
pub fn parse_recommendations(raw: &str) -> Result<Vec<String>> {
    let reply: RecommendationsReply = decode(raw)?;
    Ok(reply.recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_a_complete_answer() {
        let response = parse_ai_response(
            r#"{"content":"Abrimos às 9h","confidence":0.88,"sources":["Horários"],"suggestedActions":["Divulgar horário"]}"#,
        )
        .expect("valid answer");
        assert_eq!(response.content, "Abrimos às 9h");
        assert_eq!(response.sources, vec!["Horários"]);
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = parse_ai_response(r#"{"content": "hi"}"#).expect_err("partial answer");
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[test]
    fn wrong_types_are_malformed() {
        let err = parse_ai_response(r#"{"content":"hi","confidence":"high","sources":[],"suggestedActions":[]}"#)
            .expect_err("string confidence");
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[test]
    fn answer_confidence_above_one_is_rejected() {
        let err = parse_ai_response(r#"{"content":"hi","confidence":85,"sources":[],"suggestedActions":[]}"#)
            .expect_err("percentage confidence");
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[test]
    fn fenced_and_chatty_output_is_unwrapped() {
        let raw = "Claro! Segue:\n```json\n{\"content\":\"ok {sim}\",\"confidence\":0.5,\"sources\":[],\"suggestedActions\":[]}\n```\nAté mais.";
        let response = parse_ai_response(raw).expect("fenced answer");
        assert_eq!(response.content, "ok {sim}");

        let raw = "Resposta: {\"recommendations\":[\"Revisar documentação\"]} fim";
        assert_eq!(
            parse_recommendations(raw).expect("inline object"),
            vec!["Revisar documentação".to_string()]
        );
    }

    #[test]
    fn backticks_inside_string_values_are_kept() {
        let raw = r#"{"content":"Use o comando ```git pull``` para atualizar","confidence":0.8,"sources":[],"suggestedActions":[]}"#;
        let response = parse_ai_response(raw).expect("answer with inline code");
        assert_eq!(response.content, "Use o comando ```git pull``` para atualizar");

        let raw = "Veja: {rascunho}\n```json\n{\"recommendations\":[\"Postar horário\"]}\n```";
        assert_eq!(
            parse_recommendations(raw).expect("fenced object after prose braces"),
            vec!["Postar horário".to_string()]
        );
    }

    #[test]
    fn plain_text_is_malformed() {
        let err = parse_ai_response("Desculpe, não entendi.").expect_err("no json");
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);

        let err = parse_ai_response("{\"content\": \"cut").expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[test]
    fn classification_accepts_exactly_three_labels() {
        for label in ["approved", "rejected", "pending"] {
            let raw = format!(
                r#"{{"classification":"{label}","confidence":0.9,"justification":"tom positivo","shouldRespond":true,"shouldDelete":false}}"#
            );
            assert!(parse_comment_classification(&raw).is_ok(), "{label}");
        }

        let err = parse_comment_classification(
            r#"{"classification":"spam","confidence":0.9,"justification":"x","shouldRespond":false,"shouldDelete":true}"#,
        )
        .expect_err("unknown label");
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }

    #[test]
    fn classification_keeps_percentage_confidence() {
        let parsed = parse_comment_classification(
            r#"{"classification":"pending","confidence":72,"justification":"ambíguo","suggestedResponse":"","shouldRespond":false,"shouldDelete":false}"#,
        )
        .expect("percentage scale");
        assert!((parsed.confidence - 72.0).abs() < f64::EPSILON);
        assert_eq!(parsed.suggested_response, None);
    }

    #[test]
    fn missing_recommendations_key_is_malformed() {
        let err = parse_recommendations(r#"{"ideas": []}"#).expect_err("wrong key");
        assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
    }
}
