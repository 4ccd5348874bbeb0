//! `streaming_forwarder` — forwards each record as an HTTP request.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::extractor::retry::{RetryExecutor, RetryPolicy, RetryResult};

use super::factory::FactoryError;
use super::{Processor, ProcessorError, Record};

/// POSTs (by default) each record's raw value to `config.url`, retrying
/// transient failures under a bounded budget before giving up. Mirrors
/// the retry discipline the Extractor's retry module already validates
/// at deserialization time.
pub struct StreamingForwarderProcessor {
    client: Client,
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    retry: RetryExecutor,
}

impl StreamingForwarderProcessor {
    /// Parse `config.url` (required), `config.method` (default `POST`),
    /// and `config.headers` (optional map of header name to value).
    pub fn from_config(config: &HashMap<String, Value>) -> Result<Self, FactoryError> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FactoryError::BadConfig("streaming_forwarder requires a string `url`".to_string())
            })?
            .to_string();

        let method = match config.get("method").and_then(Value::as_str) {
            Some(m) => m
                .parse::<Method>()
                .map_err(|e| FactoryError::BadConfig(format!("invalid `method`: {e}")))?,
            None => Method::POST,
        };

        let headers = match config.get("headers") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    v.as_str()
                        .map(|s| (k.clone(), s.to_string()))
                        .ok_or_else(|| {
                            FactoryError::BadConfig(format!(
                                "header {k:?} must have a string value"
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(FactoryError::BadConfig(
                    "streaming_forwarder `headers` must be an object".to_string(),
                ))
            }
            None => Vec::new(),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FactoryError::BadConfig(format!("could not build HTTP client: {e}")))?;

        let retry = RetryExecutor::new(RetryPolicy::exponential(
            3,
            Duration::from_millis(100),
            Duration::from_secs(5),
        ));

        Ok(Self {
            client,
            url,
            method,
            headers,
            retry,
        })
    }
}

#[async_trait]
impl Processor for StreamingForwarderProcessor {
    async fn process(&self, record: &Record) -> Result<(), ProcessorError> {
        let result = self
            .retry
            .execute_with_predicate(
                || async {
                    let mut req = self
                        .client
                        .request(self.method.clone(), &self.url)
                        .body(record.value.clone());
                    for (name, value) in &self.headers {
                        req = req.header(name, value);
                    }

                    let response = req.send().await.map_err(|e| e.to_string())?;
                    let status = response.status();
                    if status.is_success() {
                        Ok(())
                    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        Err(format!("server returned {status}"))
                    } else {
                        // 4xx other than 429 is a permanent rejection; the
                        // predicate below short-circuits the retry loop.
                        Err(format!("PERMANENT:{status}"))
                    }
                },
                |error: &String| !error.starts_with("PERMANENT:"),
            )
            .await;

        match result {
            RetryResult::Success { .. } => Ok(()),
            RetryResult::Failed { error, .. } => {
                if let Some(status) = error.strip_prefix("PERMANENT:") {
                    Err(ProcessorError::Permanent(format!(
                        "non-retryable response: {status}"
                    )))
                } else {
                    Err(ProcessorError::Transient(error))
                }
            }
        }
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> Record {
        Record {
            topic: "t".to_string(),
            partition: 0,
            offset: 0,
            key: None,
            value: b"payload".to_vec(),
            timestamp: None,
        }
    }

    #[test]
    fn missing_url_is_bad_config() {
        let err = StreamingForwarderProcessor::from_config(&HashMap::new()).unwrap_err();
        assert!(matches!(err, FactoryError::BadConfig(_)));
    }

    #[test]
    fn invalid_method_is_bad_config() {
        let mut config = HashMap::new();
        config.insert("url".to_string(), Value::String("http://x/".to_string()));
        config.insert(
            "method".to_string(),
            Value::String("NOT A METHOD".to_string()),
        );
        let err = StreamingForwarderProcessor::from_config(&config).unwrap_err();
        assert!(matches!(err, FactoryError::BadConfig(_)));
    }

    #[tokio::test]
    async fn successful_response_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = HashMap::new();
        config.insert(
            "url".to_string(),
            Value::String(format!("{}/ingest", server.uri())),
        );
        let processor = StreamingForwarderProcessor::from_config(&config).unwrap();

        processor.process(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn client_error_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let mut config = HashMap::new();
        config.insert(
            "url".to_string(),
            Value::String(format!("{}/ingest", server.uri())),
        );
        let processor = StreamingForwarderProcessor::from_config(&config).unwrap();

        let err = processor.process(&record()).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_exhausts_retries_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut config = HashMap::new();
        config.insert(
            "url".to_string(),
            Value::String(format!("{}/ingest", server.uri())),
        );
        let processor = StreamingForwarderProcessor::from_config(&config).unwrap();

        let err = processor.process(&record()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[rstest]
    #[case(429, true)]
    #[case(500, true)]
    #[case(503, true)]
    #[case(400, false)]
    #[case(404, false)]
    #[case(403, false)]
    #[tokio::test]
    async fn status_code_classification_matches_retry_boundary(#[case] status: u16, #[case] retryable: bool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let mut config = HashMap::new();
        config.insert(
            "url".to_string(),
            Value::String(format!("{}/ingest", server.uri())),
        );
        let processor = StreamingForwarderProcessor::from_config(&config).unwrap();

        let err = processor.process(&record()).await.unwrap_err();
        assert_eq!(err.is_retryable(), retryable);
    }
}
