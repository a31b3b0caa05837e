//! Signed JSON webhook delivery.

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use sha2::Sha256;
use std::collections::HashMap;

use crate::services::notification::NotificationError;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Posts JSON bodies, signing them when a secret is configured.
///
/// The signature is the hex HMAC-SHA256 of the body bytes followed by the
/// millisecond timestamp, sent as `X-Signature` next to `X-Timestamp`.
#[derive(Clone)]
pub struct WebhookSender {
	client: ClientWithMiddleware,
	secret: Option<String>,
}

impl WebhookSender {
	pub fn new(client: ClientWithMiddleware, secret: Option<String>) -> Self {
		Self {
			client,
			secret: secret.filter(|s| !s.is_empty()),
		}
	}

	pub fn sign_payload(
		secret: &str,
		body: &[u8],
		timestamp: i64,
	) -> Result<String, NotificationError> {
		let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
			NotificationError::config_error(format!("Invalid secret: {}", e), None, None)
		})?;
		mac.update(body);
		mac.update(timestamp.to_string().as_bytes());
		Ok(hex::encode(mac.finalize().into_bytes()))
	}

	/// Sends `payload` to `url`; anything but a 2xx answer is an error
	pub async fn send<T: Serialize + ?Sized>(
		&self,
		url: &str,
		payload: &T,
		extra_headers: &HashMap<String, String>,
	) -> Result<(), NotificationError> {
		let metadata = || Some(HashMap::from([("url".to_string(), url.to_string())]));

		let body = serde_json::to_vec(payload).map_err(|e| {
			NotificationError::internal_error("failed to encode payload", Some(Box::new(e)), metadata())
		})?;

		let mut headers = HeaderMap::new();
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		if let Some(secret) = &self.secret {
			let timestamp = Utc::now().timestamp_millis();
			let signature = Self::sign_payload(secret, &body, timestamp)?;
			insert_header(&mut headers, "X-Signature", &signature)?;
			insert_header(&mut headers, "X-Timestamp", &timestamp.to_string())?;
		}

		for (key, value) in extra_headers {
			insert_header(&mut headers, key, value)?;
		}

		let response = self
			.client
			.post(url)
			.headers(headers)
			.body(body)
			.send()
			.await
			.map_err(|e| {
				NotificationError::network_error(
					"Failed to send webhook notification",
					Some(Box::new(e)),
					metadata(),
				)
			})?;

		if !response.status().is_success() {
			return Err(NotificationError::network_error(
				format!("Webhook returned error status: {}", response.status()),
				None,
				metadata(),
			));
		}

		Ok(())
	}
}

fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) -> Result<(), NotificationError> {
	let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
		return Err(NotificationError::config_error(
			format!("Invalid header name: {}", key),
			None,
			None,
		));
	};
	let Ok(value) = HeaderValue::from_str(value) else {
		return Err(NotificationError::config_error(
			format!("Invalid header value for key: {}", key),
			None,
			None,
		));
	};
	headers.insert(name, value);
	Ok(())
}
