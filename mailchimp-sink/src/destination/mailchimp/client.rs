use mailchimp_config::shared::SinkConfig;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::destination::mailchimp::encoding::{
    ApiErrorBody, BatchSubscribeBody, BatchSubscribeResponse, PingBody, PingResponse,
};
use crate::destination::{
    BulkSubscribeReport, BulkSubscribeRequest, DestinationConnector, SubscriberDestination,
};
use crate::error::{ErrorClass, ErrorKind, SinkError, SinkResult};
use crate::{bail, sink_error};

/// Host under which every MailChimp data center serves the API.
const API_HOST: &str = "api.mailchimp.com";

/// Version segment of the API path.
const API_VERSION: &str = "2.0";

const PING_METHOD: &str = "helper/ping";

const BATCH_SUBSCRIBE_METHOD: &str = "lists/batch-subscribe";

/// Client for the MailChimp 2.0 API.
///
/// The client is connected through [`MailChimpClient::connect`], which pings the API so that
/// invalid credentials surface before any subscriber is buffered.
#[derive(Debug, Clone)]
pub struct MailChimpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl MailChimpClient {
    /// Creates a client from `config` and validates its API key.
    ///
    /// Every failure, including an unreachable API, is reported as a configuration error.
    pub async fn connect(config: &SinkConfig) -> SinkResult<Self> {
        let root = match &config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => endpoint_for_api_key(config.apikey.expose_secret())?,
        };

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| {
                sink_error!(
                    ErrorKind::ConfigError,
                    "Failed to build the HTTP client",
                    err.to_string(),
                    source: err
                )
            })?;

        let client = Self {
            http,
            base_url: format!("{root}/{API_VERSION}"),
            api_key: config.apikey.clone(),
        };

        client.ping().await.map_err(|err| {
            if err.class() == ErrorClass::Configuration {
                return err;
            }

            let detail = err.to_string();
            sink_error!(
                ErrorKind::ConfigError,
                "Failed to validate MailChimp credentials",
                detail = detail,
                source: err
            )
        })?;

        info!(base_url = %client.base_url, "connected to MailChimp");

        Ok(client)
    }

    /// Returns the API base URL, version segment included.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn ping(&self) -> SinkResult<()> {
        let body = PingBody {
            apikey: self.api_key.expose_secret(),
        };
        let response: PingResponse = self.call(PING_METHOD, &body).await?;
        debug!(msg = ?response.msg, "MailChimp ping succeeded");

        Ok(())
    }

    /// Posts `body` to an API method and decodes its response.
    ///
    /// Transient failures are logged here, the caller decides whether to retry.
    async fn call<B, R>(&self, method: &'static str, body: &B) -> SinkResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let result = self.call_inner(method, body).await;
        if let Err(err) = &result
            && err.class() == ErrorClass::Transient
        {
            warn!(method, error = %err, "MailChimp call failed transiently");
        }

        result
    }

    async fn call_inner<B, R>(&self, method: &'static str, body: &B) -> SinkResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{method}.json", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        let json: serde_json::Value = match serde_json::from_str(&text) {
            Ok(json) => json,
            Err(err) => return Err(unparseable_response_error(status, &text, err)),
        };

        if let Ok(api_error) = ApiErrorBody::deserialize(&json)
            && api_error.is_error()
        {
            return Err(api_error_to_sink_error(status, api_error));
        }

        if !status.is_success() {
            return Err(status_to_sink_error(status, &text));
        }

        serde_json::from_value(json).map_err(|err| {
            sink_error!(
                ErrorKind::DeserializationError,
                "Unexpected MailChimp response",
                format!("{method} returned a response that could not be decoded: {err}"),
                source: err
            )
        })
    }
}

impl SubscriberDestination for MailChimpClient {
    fn name() -> &'static str {
        "mailchimp"
    }

    async fn bulk_subscribe(
        &self,
        request: BulkSubscribeRequest<'_>,
    ) -> SinkResult<BulkSubscribeReport> {
        let body = BatchSubscribeBody::new(self.api_key.expose_secret(), request);
        let response: BatchSubscribeResponse = self.call(BATCH_SUBSCRIBE_METHOD, &body).await?;
        let report = BulkSubscribeReport::from(response);

        info!(
            list_id = request.list_id,
            created = report.add_count,
            updated = report.update_count,
            failed = report.error_count,
            "{} records created, {} records updated, {} records failed",
            report.add_count,
            report.update_count,
            report.error_count
        );

        for subscriber_error in &report.errors {
            error!(
                list_id = request.list_id,
                email = %mask_email(&subscriber_error.email),
                code = subscriber_error.code,
                "subscriber rejected: {}",
                subscriber_error.message
            );
        }

        Ok(report)
    }
}

/// Connects [`MailChimpClient`]s from the sink configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailChimpConnector;

impl DestinationConnector for MailChimpConnector {
    type Destination = MailChimpClient;

    async fn connect(&self, config: &SinkConfig) -> SinkResult<MailChimpClient> {
        MailChimpClient::connect(config).await
    }
}

/// Derives the API root from the data center suffix of an API key (`<key>-us15`).
pub fn endpoint_for_api_key(api_key: &str) -> SinkResult<String> {
    let data_center = api_key
        .rsplit_once('-')
        .map(|(_, data_center)| data_center)
        .filter(|data_center| {
            !data_center.is_empty() && data_center.chars().all(|c| c.is_ascii_alphanumeric())
        });

    let Some(data_center) = data_center else {
        bail!(
            ErrorKind::ConfigError,
            "Invalid MailChimp API key",
            "the API key must end with its data center, for example `-us1`"
        );
    };

    Ok(format!("https://{data_center}.{API_HOST}"))
}

/// Masks the local part of an email, keeping its first and last two characters.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_owned();
    };

    let length = local.chars().count();
    let masked: String = local
        .chars()
        .enumerate()
        .map(|(index, c)| {
            if index >= 1 && index + 2 < length {
                '*'
            } else {
                c
            }
        })
        .collect();

    format!("{masked}@{domain}")
}

/// Classifies a failure to send a request or read its response.
fn transport_error(err: reqwest::Error) -> SinkError {
    let detail = err.to_string();

    if err.is_builder() {
        return sink_error!(
            ErrorKind::SerializationError,
            "Failed to build the MailChimp request",
            detail = detail,
            source: err
        );
    }

    let description = if err.is_timeout() {
        "MailChimp request timed out"
    } else {
        "MailChimp connection failed"
    };

    sink_error!(
        ErrorKind::DestinationConnectionFailed,
        description,
        detail = detail,
        source: err
    )
}

/// Classifies a response whose body is not JSON, typically an HTML page from a gateway.
fn unparseable_response_error(
    status: StatusCode,
    body: &str,
    err: serde_json::Error,
) -> SinkError {
    let detail = format!("status {status}, body: {}", truncate(body));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => sink_error!(
            ErrorKind::AuthenticationError,
            "MailChimp rejected the credentials",
            detail = detail,
            source: err
        ),
        StatusCode::TOO_MANY_REQUESTS => sink_error!(
            ErrorKind::DestinationThrottled,
            "MailChimp throttled the request",
            detail = detail,
            source: err
        ),
        _ => sink_error!(
            ErrorKind::DestinationUnavailable,
            "MailChimp returned a non-JSON response",
            detail = detail,
            source: err
        ),
    }
}

/// Classifies an API error body by its error name.
fn api_error_to_sink_error(status: StatusCode, api_error: ApiErrorBody) -> SinkError {
    let name = api_error.name.as_deref().unwrap_or("Unknown");
    let detail = format!(
        "status {status}, error {name} ({}): {}",
        api_error.code.unwrap_or_default(),
        api_error.error.as_deref().unwrap_or("no message")
    );

    let (kind, description) = match name {
        // Capacity and maintenance errors
        "Too_Many_Connections" => (
            ErrorKind::DestinationThrottled,
            "MailChimp has too many open connections for this account",
        ),
        "User_UnderMaintenance" => (
            ErrorKind::DestinationUnavailable,
            "MailChimp account is under maintenance",
        ),

        // Credential errors
        "Invalid_ApiKey" | "Invalid_AppKey" | "User_Disabled" | "User_DoesNotExist"
        | "User_InvalidRole" | "User_NotApproved" => (
            ErrorKind::AuthenticationError,
            "MailChimp rejected the credentials",
        ),

        "List_DoesNotExist" => (
            ErrorKind::PayloadRejected,
            "MailChimp list does not exist",
        ),

        // Anything else reported by the API is a problem with the payload, unless the status
        // says otherwise.
        _ => match status {
            StatusCode::TOO_MANY_REQUESTS => (
                ErrorKind::DestinationThrottled,
                "MailChimp throttled the request",
            ),
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => (
                ErrorKind::DestinationUnavailable,
                "MailChimp is temporarily unavailable",
            ),
            _ => (
                ErrorKind::PayloadRejected,
                "MailChimp rejected the request",
            ),
        },
    };

    sink_error!(kind, description, detail = detail)
}

/// Classifies a JSON response with an error status but without an API error body.
fn status_to_sink_error(status: StatusCode, body: &str) -> SinkError {
    let detail = format!("status {status}, body: {}", truncate(body));

    let (kind, description) = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => (
            ErrorKind::AuthenticationError,
            "MailChimp rejected the credentials",
        ),
        StatusCode::NOT_FOUND => (
            ErrorKind::PayloadRejected,
            "MailChimp API method not found",
        ),
        StatusCode::TOO_MANY_REQUESTS => (
            ErrorKind::DestinationThrottled,
            "MailChimp throttled the request",
        ),
        status if status.is_server_error() => (
            ErrorKind::DestinationUnavailable,
            "MailChimp is temporarily unavailable",
        ),
        _ => (
            ErrorKind::PayloadRejected,
            "MailChimp rejected the request",
        ),
    };

    sink_error!(kind, description, detail = detail)
}

/// Shortens response bodies embedded in error details.
fn truncate(body: &str) -> &str {
    const MAX_BODY_CHARS: usize = 512;

    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(name: &str) -> ApiErrorBody {
        ApiErrorBody {
            status: "error".to_owned(),
            code: Some(-1),
            name: Some(name.to_owned()),
            error: Some("message".to_owned()),
        }
    }

    #[test]
    fn test_endpoint_is_derived_from_data_center() {
        assert_eq!(
            endpoint_for_api_key("0123456789abcdef-us15").unwrap(),
            "https://us15.api.mailchimp.com"
        );
    }

    #[test]
    fn test_api_key_without_data_center_is_rejected() {
        for key in ["0123456789abcdef", "0123456789abcdef-", "abc-us 1"] {
            let err = endpoint_for_api_key(key).unwrap_err();
            assert_eq!(err.class(), ErrorClass::Configuration);
        }
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("abcdef@example.com"), "a***ef@example.com");
        assert_eq!(mask_email("abc@example.com"), "abc@example.com");
        assert_eq!(mask_email("not-an-email"), "not-an-email");
    }

    #[test]
    fn test_classifies_api_errors_by_name() {
        let status = StatusCode::INTERNAL_SERVER_ERROR;

        assert_eq!(
            api_error_to_sink_error(status, api_error("Too_Many_Connections")).kind(),
            ErrorKind::DestinationThrottled
        );
        assert_eq!(
            api_error_to_sink_error(status, api_error("User_UnderMaintenance")).kind(),
            ErrorKind::DestinationUnavailable
        );
        assert_eq!(
            api_error_to_sink_error(status, api_error("Invalid_ApiKey")).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            api_error_to_sink_error(status, api_error("ValidationError")).kind(),
            ErrorKind::PayloadRejected
        );
    }

    #[test]
    fn test_unknown_list_and_method_are_data_errors() {
        let err = api_error_to_sink_error(StatusCode::OK, api_error("List_DoesNotExist"));
        assert_eq!(err.kind(), ErrorKind::PayloadRejected);
        assert_eq!(err.class(), ErrorClass::Data);

        let err = status_to_sink_error(StatusCode::NOT_FOUND, "{}");
        assert_eq!(err.kind(), ErrorKind::PayloadRejected);
        assert_eq!(err.class(), ErrorClass::Data);
    }

    #[test]
    fn test_classifies_unnamed_api_errors_by_status() {
        assert_eq!(
            api_error_to_sink_error(StatusCode::SERVICE_UNAVAILABLE, api_error("Other")).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            status_to_sink_error(StatusCode::BAD_REQUEST, "{}").class(),
            ErrorClass::Data
        );
        assert_eq!(
            status_to_sink_error(StatusCode::BAD_GATEWAY, "{}").class(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(600);
        assert_eq!(truncate(&body).chars().count(), 512);
    }
}
