//! Source readers: where the records to load come from.
//!
//! Two kinds of feed are supported: a static JSON array on disk, and a
//! GraphQL endpoint answering `{ data: { <collection>: { nodes: [...] } } }`.
//! Either failing is fatal for the run.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Errors reading a record feed.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid record list: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("feed request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("no data found in the response")]
    NoData,

    #[error("response has no '{collection}.nodes' list")]
    MissingCollection { collection: String },

    #[error("feed record does not match the expected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Records from a JSON array file.
#[derive(Debug, Clone)]
pub struct StaticSource<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T: DeserializeOwned> StaticSource<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<T>, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Pull `data.<collection>.nodes` out of a GraphQL response body.
pub fn extract_nodes<T: DeserializeOwned>(
    response: Value,
    collection: &str,
) -> Result<Vec<T>, SourceError> {
    let data = match response.get("data") {
        Some(data) if !data.is_null() => data,
        _ => return Err(SourceError::NoData),
    };
    let nodes = data
        .get(collection)
        .and_then(|c| c.get("nodes"))
        .filter(|n| n.is_array())
        .cloned()
        .ok_or_else(|| SourceError::MissingCollection {
            collection: collection.to_string(),
        })?;
    serde_json::from_value(nodes).map_err(SourceError::Shape)
}

/// Query text selecting `fields` from every node of `collection`.
pub fn collection_query(collection: &str, fields: &[&str]) -> String {
    format!(
        "query {{ {} {{ nodes {{ {} }} }} }}",
        collection,
        fields.join(" ")
    )
}

#[cfg(feature = "graphql")]
pub use graphql::GraphqlSource;

#[cfg(feature = "graphql")]
mod graphql {
    use super::*;

    /// One POST of a fixed query to a GraphQL endpoint.
    #[derive(Debug, Clone)]
    pub struct GraphqlSource {
        endpoint: String,
        collection: String,
        query: String,
    }

    impl GraphqlSource {
        pub fn new(endpoint: &str, collection: &str, fields: &[&str]) -> Self {
            Self {
                endpoint: endpoint.to_string(),
                collection: collection.to_string(),
                query: collection_query(collection, fields),
            }
        }

        pub fn query(&self) -> &str {
            &self.query
        }

        /// Fetch and decode every node. Runs the blocking request off the
        /// async runtime.
        pub async fn fetch<T>(&self) -> Result<Vec<T>, SourceError>
        where
            T: DeserializeOwned + Send + 'static,
        {
            let endpoint = self.endpoint.clone();
            let body = serde_json::json!({ "query": self.query });

            let response = tokio::task::spawn_blocking(move || {
                let agent = ureq::Agent::new_with_defaults();
                let response =
                    agent
                        .post(&endpoint)
                        .send_json(&body)
                        .map_err(|e| SourceError::Transport {
                            endpoint: endpoint.clone(),
                            message: e.to_string(),
                        })?;
                response
                    .into_body()
                    .read_json::<Value>()
                    .map_err(|e| SourceError::Transport {
                        endpoint,
                        message: format!("failed to parse response as JSON: {}", e),
                    })
            })
            .await
            .map_err(|e| SourceError::Transport {
                endpoint: self.endpoint.clone(),
                message: format!("task join error: {}", e),
            })??;

            extract_nodes(response, &self.collection)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Node {
        template_name: String,
        template_id_string: String,
    }

    #[test]
    fn nodes_are_extracted() {
        let response = json!({
            "data": { "allCourseTemplate": { "nodes": [
                { "templateName": "Universal Credit Overview", "templateIdString": "universal_credit_overview" }
            ] } }
        });
        let nodes: Vec<Node> = extract_nodes(response, "allCourseTemplate").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].template_id_string, "universal_credit_overview");
    }

    #[test]
    fn absent_data_is_no_data() {
        let err = extract_nodes::<Node>(json!({ "errors": [] }), "allCourseTemplate").unwrap_err();
        assert!(matches!(err, SourceError::NoData));
        let err = extract_nodes::<Node>(json!({ "data": null }), "allCourseTemplate").unwrap_err();
        assert!(matches!(err, SourceError::NoData));
    }

    #[test]
    fn wrong_collection_is_reported() {
        let err = extract_nodes::<Node>(json!({ "data": { "other": {} } }), "allCourseTemplate")
            .unwrap_err();
        assert!(matches!(err, SourceError::MissingCollection { .. }));
    }

    #[test]
    fn query_selects_fields() {
        assert_eq!(
            collection_query("allCourseTemplate", &["templateName", "templateIdString"]),
            "query { allCourseTemplate { nodes { templateName templateIdString } } }"
        );
    }

    #[test]
    fn static_source_reads_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"templateName":"A","templateIdString":"a"}},{{"templateName":"B","templateIdString":"b"}}]"#
        )
        .unwrap();
        let records = StaticSource::<Node>::new(file.path()).read().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].template_name, "B");
    }

    #[test]
    fn static_source_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = StaticSource::<Node>::new(tmp.path().join("none.json"))
            .read()
            .unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn static_source_rejects_non_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"not":"a list"}}"#).unwrap();
        let err = StaticSource::<Node>::new(file.path()).read().unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }
}
