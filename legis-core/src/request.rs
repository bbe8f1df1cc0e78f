//! Research requests and query plans

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An uploaded attachment. `content` is base64 on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub content: String,
    pub media_type: String,
}

/// A research request as accepted from a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of_date: Option<NaiveDate>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            providers: None,
            limit: None,
            attachments: Vec::new(),
            as_of_date: None,
        }
    }

    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_as_of_date(mut self, date: NaiveDate) -> Self {
        self.as_of_date = Some(date);
        self
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Output of the query planner
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    #[serde(default)]
    pub subqueries: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl QueryPlan {
    /// Subqueries with blanks removed
    pub fn effective_subqueries(&self) -> Vec<String> {
        self.subqueries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_minimal_json() {
        let request: ResearchRequest =
            serde_json::from_str(r#"{"query": "consumption tax amendment"}"#).unwrap();
        assert_eq!(request.query, "consumption tax amendment");
        assert!(!request.has_attachments());
        assert!(request.providers.is_none());
    }

    #[test]
    fn test_request_with_attachment_and_date() {
        let request: ResearchRequest = serde_json::from_str(
            r#"{
                "query": "q",
                "limit": 10,
                "asOfDate": "2024-06-01",
                "attachments": [{"name": "bill.txt", "content": "aGVsbG8=", "mediaType": "text/plain"}]
            }"#,
        )
        .unwrap();
        assert!(request.has_attachments());
        assert_eq!(request.attachments[0].media_type, "text/plain");
        assert_eq!(request.as_of_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[test]
    fn test_effective_subqueries_drops_blanks() {
        let plan = QueryPlan {
            subqueries: vec!["a".into(), "  ".into(), " b ".into()],
            ..Default::default()
        };
        assert_eq!(plan.effective_subqueries(), vec!["a", "b"]);
    }
}
