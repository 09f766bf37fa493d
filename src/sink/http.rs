// src/sink/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::{RecordSink, StreamRecord};

/// POSTs each record envelope to a stream ingestion gateway.
#[derive(Clone)]
pub struct HttpStreamSink {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpStreamSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait::async_trait]
impl RecordSink for HttpStreamSink {
    async fn put(&self, partition_key: &str, payload: &[u8]) -> Result<()> {
        let body = StreamRecord::encode(partition_key, payload);
        let rsp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("stream gateway post")?
            .error_for_status()
            .context("stream gateway non-2xx")?;
        tracing::debug!(partition_key, status = %rsp.status(), "record accepted by stream gateway");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http-stream"
    }
}
