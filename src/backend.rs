//! Client for the remote graph-query (SPARQL) endpoint.
//!
//! Queries are POSTed as form data (`query`, `format=json`) and the JSON
//! result set is returned untouched so handlers can relay it.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::errors::BackendError;
use crate::models::TitleRecord;

#[async_trait]
pub trait SparqlBackend: Send + Sync {
    /// Execute a SELECT query and return the JSON result set.
    async fn select(&self, query: &str) -> Result<Value, BackendError>;
}

#[derive(Debug, Clone)]
pub struct HttpSparqlBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSparqlBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SparqlBackend for HttpSparqlBackend {
    async fn select(&self, query: &str) -> Result<Value, BackendError> {
        tracing::debug!(endpoint = %self.endpoint, "posting query:\n{}", query);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .form(&[("query", query), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %self.endpoint, status = status.as_u16(), "query failed");
            return Err(BackendError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

// ============================================================================
// Result Set Parsing
// ============================================================================

/// The `results.bindings` rows of a SPARQL JSON result set.
pub fn bindings(result: &Value) -> Result<&Vec<Value>, BackendError> {
    result
        .get("results")
        .and_then(|r| r.get("bindings"))
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::Malformed("missing results.bindings".to_string()))
}

/// Value of `var` in one binding row, if bound.
pub fn binding_value<'a>(row: &'a Value, var: &str) -> Option<&'a str> {
    row.get(var)?.get("value")?.as_str()
}

/// Parse the bulk title listing. Every row must bind both `id` and `title`;
/// a single bad row fails the whole listing.
pub fn parse_title_rows(result: &Value) -> Result<Vec<TitleRecord>, BackendError> {
    bindings(result)?
        .iter()
        .enumerate()
        .map(|(i, row)| {
            match (binding_value(row, "id"), binding_value(row, "title")) {
                (Some(id), Some(title)) => Ok(TitleRecord::new(id, title)),
                _ => Err(BackendError::Malformed(format!(
                    "row {} lacks an id or title binding",
                    i
                ))),
            }
        })
        .collect()
}

/// Collect the bound values of a single-column listing, skipping unbound rows.
pub fn parse_column(result: &Value, var: &str) -> Result<Vec<String>, BackendError> {
    Ok(bindings(result)?
        .iter()
        .filter_map(|row| binding_value(row, var).map(str::to_string))
        .collect())
}

/// An empty result set with the given variables, used when a search is
/// answered without consulting the backend.
pub fn empty_result(vars: &[&str]) -> Value {
    serde_json::json!({
        "head": { "vars": vars },
        "results": { "bindings": [] }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str, title: &str) -> Value {
        json!({
            "id": { "type": "literal", "value": id },
            "title": { "type": "literal", "value": title }
        })
    }

    #[test]
    fn test_parse_title_rows() {
        let result = json!({
            "head": { "vars": ["title", "id"] },
            "results": { "bindings": [row("1", "Spring"), row("2", "Summer")] }
        });
        let records = parse_title_rows(&result).unwrap();
        assert_eq!(records, vec![TitleRecord::new("1", "Spring"), TitleRecord::new("2", "Summer")]);
    }

    #[test]
    fn test_parse_title_rows_rejects_partial_rows() {
        let result = json!({
            "results": { "bindings": [row("1", "Spring"), { "id": { "value": "2" } }] }
        });
        assert!(matches!(parse_title_rows(&result), Err(BackendError::Malformed(_))));
    }

    #[test]
    fn test_missing_bindings_is_malformed() {
        assert!(matches!(parse_title_rows(&json!({"head": {}})), Err(BackendError::Malformed(_))));
    }

    #[test]
    fn test_parse_column_skips_unbound() {
        let result = json!({
            "results": { "bindings": [
                { "key": { "value": "Dmaj" } },
                {},
                { "key": { "value": "Gmaj" } }
            ] }
        });
        assert_eq!(parse_column(&result, "key").unwrap(), vec!["Dmaj", "Gmaj"]);
    }

    #[test]
    fn test_empty_result_shape() {
        let value = empty_result(&["title", "id"]);
        assert_eq!(bindings(&value).unwrap().len(), 0);
        assert_eq!(value["head"]["vars"][1], "id");
    }
}
