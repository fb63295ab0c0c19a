//! Wire types for the BigQuery REST v2 `jobs.query` surface: camelCase on
//! the wire, integers frequently string-encoded.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// GoogleSQL text. Every value derived from user input is conveyed via
    /// `query_parameters`, never interpolated.
    pub query: String,
    pub use_legacy_sql: bool,
    /// `NAMED` to use `@param` placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub query_parameters: Vec<QueryParameter>,
    /// How long the call may block waiting for completion before the client
    /// falls back to polling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    pub name: String,
    pub parameter_type: QueryParameterType,
    pub parameter_value: QueryParameterValue,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterType {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_type: Option<Box<QueryParameterType>>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub array_values: Vec<QueryParameterValue>,
}

impl QueryParameter {
    pub fn timestamp(name: &str, at: chrono::DateTime<chrono::Utc>) -> QueryParameter {
        QueryParameter {
            name: name.to_string(),
            parameter_type: QueryParameterType {
                kind: "TIMESTAMP".to_string(),
                array_type: None,
            },
            parameter_value: QueryParameterValue {
                value: Some(at.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string()),
                array_values: Vec::new(),
            },
        }
    }

    pub fn string_array(name: &str, values: &[String]) -> QueryParameter {
        QueryParameter {
            name: name.to_string(),
            parameter_type: QueryParameterType {
                kind: "ARRAY".to_string(),
                array_type: Some(Box::new(QueryParameterType {
                    kind: "STRING".to_string(),
                    array_type: None,
                })),
            },
            parameter_value: QueryParameterValue {
                value: None,
                array_values: values
                    .iter()
                    .map(|v| QueryParameterValue {
                        value: Some(v.clone()),
                        array_values: Vec::new(),
                    })
                    .collect(),
            },
        }
    }

    pub fn int_array(name: &str, values: &[i64]) -> QueryParameter {
        QueryParameter {
            name: name.to_string(),
            parameter_type: QueryParameterType {
                kind: "ARRAY".to_string(),
                array_type: Some(Box::new(QueryParameterType {
                    kind: "INT64".to_string(),
                    array_type: None,
                })),
            },
            parameter_value: QueryParameterValue {
                value: None,
                array_values: values
                    .iter()
                    .map(|v| QueryParameterValue {
                        value: Some(v.to_string()),
                        array_values: Vec::new(),
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
pub struct TableCell {
    #[serde(default)]
    pub v: Value,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// Response shape shared by `jobs.query` and `jobs.getQueryResults`.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub job_complete: bool,
    #[serde(default)]
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub total_rows: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_serializes_camel_case() {
        let req = QueryRequest {
            query: "SELECT 1".to_string(),
            use_legacy_sql: false,
            parameter_mode: Some("NAMED".to_string()),
            query_parameters: vec![QueryParameter::string_array(
                "countries",
                &["US".to_string()],
            )],
            timeout_ms: Some(10_000),
            max_results: None,
            location: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["useLegacySql"], false);
        assert_eq!(json["timeoutMs"], 10_000);
        assert_eq!(
            json["queryParameters"][0]["parameterType"]["arrayType"]["type"],
            "STRING"
        );
        assert_eq!(
            json["queryParameters"][0]["parameterValue"]["arrayValues"][0]["value"],
            "US"
        );
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let resp: QueryResponse = serde_json::from_str(r#"{"jobComplete": false}"#).unwrap();
        assert!(!resp.job_complete);
        assert!(resp.rows.is_empty());
        assert!(resp.schema.is_none());
    }
}
