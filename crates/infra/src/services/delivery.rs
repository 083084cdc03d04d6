use hookpost_domain::{Attachment, WirePayload};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::warn;

/// How the webhook endpoint answered one delivery attempt. The dispatcher
/// books all three the same way, the distinction exists for logs and for
/// callers that surface execution history.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryResult {
    /// 2xx
    Success(u16),
    /// 4xx, the payload or url will not get better on its own
    Rejected(u16),
    /// 5xx, timeout or connection error
    Transient(Option<u16>),
}

impl DeliveryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success(status),
            400..=499 => Self::Rejected(status),
            _ => Self::Transient(Some(status)),
        }
    }
}

#[async_trait::async_trait]
pub trait IDeliveryService: Send + Sync {
    async fn deliver(
        &self,
        url: &str,
        payload: &WirePayload,
        attachments: &[Attachment],
    ) -> DeliveryResult;
}

/// Posts wire payloads to webhook endpoints. One HTTP POST per occurrence,
/// JSON body when the message has no attachments, multipart form data with
/// a `payload_json` part and indexed `files[n]` parts otherwise.
pub struct WebhookDeliveryService {
    client: reqwest::Client,
}

impl WebhookDeliveryService {
    /// The timeout is mandatory: a hung endpoint must fail the attempt, not
    /// stall the dispatcher pass it runs in.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn attachment_part(attachment: &Attachment) -> Part {
    let part = Part::bytes(attachment.data.clone()).file_name(attachment.filename.clone());
    match &attachment.content_type {
        Some(content_type) => part.mime_str(content_type).unwrap_or_else(|_| {
            Part::bytes(attachment.data.clone()).file_name(attachment.filename.clone())
        }),
        None => part,
    }
}

#[async_trait::async_trait]
impl IDeliveryService for WebhookDeliveryService {
    async fn deliver(
        &self,
        url: &str,
        payload: &WirePayload,
        attachments: &[Attachment],
    ) -> DeliveryResult {
        let request = if attachments.is_empty() {
            self.client.post(url).json(payload)
        } else {
            let payload_json =
                serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
            let mut form = Form::new().text("payload_json", payload_json);
            for (i, attachment) in attachments.iter().enumerate() {
                form = form.part(format!("files[{}]", i), attachment_part(attachment));
            }
            self.client.post(url).multipart(form)
        };

        match request.send().await {
            Ok(response) => DeliveryResult::from_status(response.status().as_u16()),
            Err(e) => {
                warn!("Webhook delivery to {} failed: {:?}", url, e);
                DeliveryResult::Transient(e.status().map(|status| status.as_u16()))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        assert_eq!(DeliveryResult::from_status(200), DeliveryResult::Success(200));
        assert_eq!(DeliveryResult::from_status(204), DeliveryResult::Success(204));
        assert_eq!(DeliveryResult::from_status(400), DeliveryResult::Rejected(400));
        assert_eq!(DeliveryResult::from_status(404), DeliveryResult::Rejected(404));
        assert_eq!(
            DeliveryResult::from_status(500),
            DeliveryResult::Transient(Some(500))
        );
        assert_eq!(
            DeliveryResult::from_status(503),
            DeliveryResult::Transient(Some(503))
        );
        assert!(DeliveryResult::Success(204).is_success());
        assert!(!DeliveryResult::Rejected(400).is_success());
        assert!(!DeliveryResult::Transient(None).is_success());
    }
}
