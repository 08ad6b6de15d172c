//! Shared fakes for integration tests.

#![allow(dead_code)]

// std
use std::{collections::VecDeque, future, sync::Arc, time::Duration};
// crates.io
use parking_lot::Mutex;
// self
use sa_token_refresh::{
	credential::CredentialBuilder,
	crypt::RsaSigner,
	http::{TokenTransport, TransportFuture},
	oauth2::{
		HttpRequest, HttpResponse,
		http::{HeaderMap, StatusCode},
	},
	url::form_urlencoded,
};

pub const SERVICE_ACCOUNT_JSON: &str = include_str!("../fixtures/service_account.json");
pub const KEY_PEM: &str = include_str!("../fixtures/service_account_key.pem");
pub const KEY_ID: &str = "0123456789abcdef";
pub const EMAIL: &str = "robot@demo-project.iam.gserviceaccount.com";
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Request as seen by a fake transport.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: String,
	pub uri: String,
	pub headers: HeaderMap,
	pub body: Vec<u8>,
	pub timeout: Duration,
}
impl RecordedRequest {
	pub fn form(&self) -> Vec<(String, String)> {
		form_urlencoded::parse(&self.body).into_owned().collect()
	}
}

#[derive(Default)]
struct Script {
	responses: VecDeque<(u16, String)>,
	requests: Vec<RecordedRequest>,
}

/// Replays scripted responses in order; the last one repeats forever.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
	script: Arc<Mutex<Script>>,
}
impl ScriptedTransport {
	pub fn new<I, B>(responses: I) -> Self
	where
		I: IntoIterator<Item = (u16, B)>,
		B: Into<String>,
	{
		let responses = responses.into_iter().map(|(status, body)| (status, body.into())).collect();

		Self { script: Arc::new(Mutex::new(Script { responses, requests: Vec::new() })) }
	}

	pub fn calls(&self) -> usize {
		self.script.lock().requests.len()
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.script.lock().requests.clone()
	}
}
impl TokenTransport for ScriptedTransport {
	fn send(&self, request: HttpRequest, timeout: Duration) -> TransportFuture<'_> {
		let mut script = self.script.lock();

		script.requests.push(RecordedRequest {
			method: request.method().to_string(),
			uri: request.uri().to_string(),
			headers: request.headers().clone(),
			body: request.body().clone(),
			timeout,
		});

		let (status, body) = if script.responses.len() > 1 {
			script.responses.pop_front().expect("Script has responses.")
		} else {
			script.responses.front().cloned().expect("Script must not be empty.")
		};

		Box::pin(async move {
			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() =
				StatusCode::from_u16(status).expect("Scripted status should be valid.");

			Ok(response)
		})
	}
}

/// Never answers.
pub struct PendingTransport;
impl TokenTransport for PendingTransport {
	fn send(&self, _request: HttpRequest, _timeout: Duration) -> TransportFuture<'_> {
		Box::pin(future::pending())
	}
}

pub fn fixture_signer() -> RsaSigner {
	RsaSigner::from_pem(KEY_PEM, Some(KEY_ID.into())).expect("Fixture key should parse.")
}

pub fn fixture_builder() -> CredentialBuilder {
	CredentialBuilder::from_service_account_json(SERVICE_ACCOUNT_JSON)
		.expect("Fixture service account should parse.")
}

pub fn token_body(token: &str, expires_in: u64) -> String {
	format!(r#"{{"access_token":"{token}","expires_in":{expires_in},"token_type":"Bearer"}}"#)
}
