use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json::Value;

/// Prediction service output. Kept opaque: whatever the service returns is
/// echoed back to the assistant verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult(pub Value);

impl AnalysisResult {
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn predicted_disease(&self) -> Option<&str> {
        self.0.get("predicted_disease").and_then(Value::as_str)
    }

    pub fn confidence(&self) -> Option<&str> {
        self.0.get("confidence").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(Value::as_str)
    }

    /// The synthetic user turn that hands the result to the assistant.
    pub fn conversation_message(&self) -> String {
        format!("The analysis is complete. Result: {}", self.0)
    }
}

pub fn parse_analysis(body: &[u8]) -> anyhow::Result<AnalysisResult> {
    let value: Value = serde_json::from_slice(body).context("decode analysis JSON")?;
    Ok(AnalysisResult(value))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Reason for a non-2xx upload response, preferring the service's own message.
pub fn upload_failure_reason(status: u16, body: &[u8]) -> anyhow::Error {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(e) if !e.error.trim().is_empty() => anyhow!("{} (status {status})", e.error.trim()),
        _ => anyhow!("server returned status {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_embeds_compact_json() {
        let r = parse_analysis(br#"{ "disease" : "X" }"#).unwrap();
        assert_eq!(
            r.conversation_message(),
            r#"The analysis is complete. Result: {"disease":"X"}"#
        );
    }

    #[test]
    fn exposes_known_fields() {
        let r = parse_analysis(
            br#"{"predicted_disease":"Tomato - Early blight","confidence":"97.12%","description":"Remove affected leaves."}"#,
        )
        .unwrap();
        assert_eq!(r.predicted_disease(), Some("Tomato - Early blight"));
        assert_eq!(r.confidence(), Some("97.12%"));
        assert_eq!(r.description(), Some("Remove affected leaves."));
    }

    #[test]
    fn non_json_body_errors() {
        assert!(parse_analysis(b"<html>bad gateway</html>").is_err());
    }

    #[test]
    fn failure_reason_prefers_service_error() {
        let e = upload_failure_reason(400, br#"{"error":"No image file provided."}"#);
        assert_eq!(e.to_string(), "No image file provided. (status 400)");

        let e = upload_failure_reason(502, b"gateway");
        assert_eq!(e.to_string(), "server returned status 502");
    }
}
