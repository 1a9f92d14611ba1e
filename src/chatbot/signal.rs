//! Signal transport over the signal-cli REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chatbot::message::{InboundMessage, OutboundMessage};
use crate::chatbot::transport::{Transport, TransportError};

/// Signal REST gateway client bound to one account.
pub struct SignalClient {
    base_url: String,
    account: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ReceivedItem {
    envelope: Envelope,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    source: Option<String>,
    source_number: Option<String>,
    source_uuid: Option<String>,
    timestamp: Option<i64>,
    data_message: Option<DataMessage>,
}

#[derive(Deserialize)]
struct DataMessage {
    message: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a str,
    number: &'a str,
    recipients: [&'a str; 1],
}

impl SignalClient {
    pub fn new(service: &str, account: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            base_url: service_url(service),
            account: account.to_string(),
            http,
        })
    }

    /// Check the gateway is reachable.
    pub async fn check_connection(&self) -> Result<(), TransportError> {
        let response = self
            .http
            .get(format!("{}/v1/about", self.base_url))
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        info!("Connected to Signal gateway at {}", self.base_url);
        Ok(())
    }
}

#[async_trait]
impl Transport for SignalClient {
    async fn receive(&self) -> Result<Vec<InboundMessage>, TransportError> {
        let url = format!(
            "{}/v1/receive/{}",
            self.base_url,
            urlencoding::encode(&self.account)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        let items: Vec<ReceivedItem> =
            serde_json::from_str(&body).map_err(|e| TransportError::Parse(e.to_string()))?;

        if !items.is_empty() {
            debug!("Received {} envelope(s)", items.len());
        }

        Ok(items.into_iter().filter_map(|item| to_inbound(item.envelope)).collect())
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let request = SendRequest {
            message: &message.text,
            number: &self.account,
            recipients: [&message.recipient],
        };

        let response = self
            .http
            .post(format!("{}/v2/send", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Failed to send to {}: {status}", message.recipient);
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        debug!("Sent {} chars to {}", message.text.chars().count(), message.recipient);
        Ok(())
    }
}

/// Only envelopes carrying a data message are user messages; receipts and
/// typing indicators are dropped.
fn to_inbound(envelope: Envelope) -> Option<InboundMessage> {
    let data = envelope.data_message?;
    let sender = envelope
        .source_number
        .or(envelope.source)
        .or(envelope.source_uuid)?;

    let received_at = envelope
        .timestamp
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Some(InboundMessage {
        sender,
        text: data.message.unwrap_or_default(),
        received_at,
    })
}

fn service_url(service: &str) -> String {
    let service = service.trim_end_matches('/');
    if service.contains("://") {
        service.to_string()
    } else {
        format!("http://{service}")
    }
}
