//! SNS notifier.

use async_trait::async_trait;
use aws_sdk_sns::config::http::HttpResponse;
use aws_sdk_sns::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client;
use tracing::{debug, info};

use super::config::NotifierConfig;
use super::error::{NotifyError, NotifyErrorKind};
use super::traits::{CompletionNotifier, NotifyResult};
use super::types::{CompletionEvent, FailureEvent, PublishReceipt};
use crate::config::{aws_sdk_config, AwsConfig};

/// Longest `message` attribute sent with a failure event.
const MAX_MESSAGE_ATTRIBUTE_CHARS: usize = 1024;

/// [`CompletionNotifier`] publishing to an SNS topic.
///
/// Every message carries `service`, `environment`, `outcome`, `format` and
/// `refid` attributes for subscription filters. Failure messages add
/// `message`.
#[derive(Debug, Clone)]
pub struct SnsNotifier {
    client: Client,
    topic_arn: String,
    service: String,
}

impl SnsNotifier {
    pub fn new(client: Client, topic_arn: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
            service: service.into(),
        }
    }

    pub async fn from_config(aws: &AwsConfig, config: &NotifierConfig) -> Self {
        let sdk_config = aws_sdk_config(aws).await;
        let mut builder = aws_sdk_sns::config::Builder::from(&sdk_config);
        if let Some(ref endpoint_url) = aws.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        info!("SNS notifier initialized (topic={})", config.topic_arn);
        Self::new(
            Client::from_conf(builder.build()),
            &config.topic_arn,
            &config.service,
        )
    }

    async fn publish(&self, message: String, attributes: Vec<(&'static str, String)>) -> NotifyResult {
        let mut request = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(message);
        for (name, value) in &attributes {
            request = request.message_attributes(*name, string_attribute(value)?);
        }

        let output = request.send().await.map_err(classify)?;
        Ok(PublishReceipt {
            message_id: output.message_id().map(str::to_string),
        })
    }
}

fn completion_attributes(event: &CompletionEvent, service: &str) -> Vec<(&'static str, String)> {
    vec![
        ("service", service.to_string()),
        ("environment", event.environment.clone()),
        ("outcome", "SUCCESS".to_string()),
        ("format", event.format.to_string()),
        ("refid", event.bundle_id.clone()),
    ]
}

fn failure_attributes(event: &FailureEvent, service: &str) -> Vec<(&'static str, String)> {
    let mut attributes = vec![
        ("service", service.to_string()),
        ("environment", event.environment.clone()),
        ("outcome", "FAILURE".to_string()),
    ];
    if let Some(format) = event.format {
        attributes.push(("format", format.to_string()));
    }
    attributes.push(("refid", event.bundle_id.clone()));
    attributes.push((
        "message",
        event.message.chars().take(MAX_MESSAGE_ATTRIBUTE_CHARS).collect(),
    ));
    attributes
}

fn string_attribute(value: &str) -> Result<MessageAttributeValue, NotifyError> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| NotifyError::rejected(format!("invalid message attribute: {}", e)))
}

/// Maps an SNS error code and HTTP status to a notify error kind.
pub(crate) fn classify_service_error(code: Option<&str>, status: u16) -> NotifyErrorKind {
    match code {
        Some("Throttled" | "Throttling" | "ThrottlingException" | "InternalError" | "KMSThrottling") => {
            NotifyErrorKind::Unreachable
        }
        _ if status == 429 || status >= 500 => NotifyErrorKind::Unreachable,
        _ => NotifyErrorKind::Rejected,
    }
}

fn classify<E>(err: SdkError<E, HttpResponse>) -> NotifyError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let detail = format!("Publish failed: {}", DisplayErrorContext(&err));
    let kind = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            NotifyErrorKind::Unreachable
        }
        SdkError::ServiceError(service) => {
            classify_service_error(service.err().code(), service.raw().status().as_u16())
        }
        _ => NotifyErrorKind::Rejected,
    };
    NotifyError::new(kind, detail)
}

#[async_trait]
impl CompletionNotifier for SnsNotifier {
    fn name(&self) -> &str {
        "sns"
    }

    async fn notify(&self, event: &CompletionEvent) -> NotifyResult {
        let message = event
            .to_json()
            .map_err(|e| NotifyError::rejected(format!("failed to encode event: {}", e)))?;

        debug!("Publishing {} to {}", event.event_id, self.topic_arn);
        self.publish(message, completion_attributes(event, &self.service))
            .await
    }

    async fn notify_failure(&self, event: &FailureEvent) -> NotifyResult {
        let message = event
            .to_json()
            .map_err(|e| NotifyError::rejected(format!("failed to encode event: {}", e)))?;

        debug!("Publishing failure {} to {}", event.event_id, self.topic_arn);
        self.publish(message, failure_attributes(event, &self.service))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::BundleFormat;
    use std::collections::BTreeMap;

    #[test]
    fn test_classify_service_error() {
        assert_eq!(classify_service_error(Some("Throttled"), 400), NotifyErrorKind::Unreachable);
        assert_eq!(classify_service_error(None, 503), NotifyErrorKind::Unreachable);
        assert_eq!(classify_service_error(Some("NotFound"), 404), NotifyErrorKind::Rejected);
        assert_eq!(
            classify_service_error(Some("AuthorizationError"), 403),
            NotifyErrorKind::Rejected
        );
    }

    #[test]
    fn test_completion_attributes() {
        let event = CompletionEvent::new(
            "abc",
            "prod",
            BundleFormat::Audio,
            BTreeMap::new(),
            None,
            "/repositories/2/digital_objects/9",
        );
        let attributes = completion_attributes(&event, "digitized_av_packaging");
        assert_eq!(
            attributes,
            vec![
                ("service", "digitized_av_packaging".to_string()),
                ("environment", "prod".to_string()),
                ("outcome", "SUCCESS".to_string()),
                ("format", "audio".to_string()),
                ("refid", "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_failure_attributes() {
        let event = FailureEvent::new(
            "abc",
            "prod",
            Some(BundleFormat::Video),
            "registering",
            "record_not_found",
            "x".repeat(5000),
        );
        let attributes: BTreeMap<_, _> = failure_attributes(&event, "digitized_av_packaging")
            .into_iter()
            .collect();
        assert_eq!(attributes["service"], "digitized_av_packaging");
        assert_eq!(attributes["outcome"], "FAILURE");
        assert_eq!(attributes["format"], "video");
        assert_eq!(attributes["refid"], "abc");
        assert_eq!(attributes["message"].len(), MAX_MESSAGE_ATTRIBUTE_CHARS);

        let unknown = FailureEvent::new("abc", "prod", None, "generating", "unsupported_input", "no master");
        assert!(failure_attributes(&unknown, "svc")
            .iter()
            .all(|(name, _)| *name != "format"));
    }

    #[test]
    fn test_string_attribute() {
        let attr = string_attribute("prod").unwrap();
        assert_eq!(attr.data_type(), "String");
        assert_eq!(attr.string_value(), Some("prod"));
    }
}
