#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
// self
use common::{fixture_builder, token_body};
use sa_token_refresh::{
	credential::{SharedCredential, TokenState},
	error::{Error, RefreshError},
	exchange::{self, TokenRequest},
	http::ReqwestTransport,
	url::Url,
};

fn transport() -> ReqwestTransport {
	ReqwestTransport::new().expect("Reqwest transport should build.")
}

#[tokio::test]
async fn refresh_round_trips_over_http() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header_exists("x-goog-api-client")
				.body_includes("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("ya29.wire", 3600));
		})
		.await;
	let mut credential = fixture_builder()
		.token_uri(server.url("/token"))
		.scopes(["https://www.googleapis.com/auth/devstorage.read_only"])
		.build()
		.expect("Credential should build.");

	credential.refresh(&transport()).await.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(credential.token().map(|token| token.expose()), Some("ya29.wire"));
	assert_eq!(credential.token_state(), TokenState::Fresh);
}

#[tokio::test]
async fn invalid_grant_is_terminal_over_http() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Invalid JWT\"}");
		})
		.await;
	let mut credential = fixture_builder()
		.token_uri(server.url("/token"))
		.build()
		.expect("Credential should build.");
	let err = credential.refresh(&transport()).await.expect_err("invalid_grant is definitive.");

	mock.assert_calls_async(1).await;

	assert!(matches!(
		err,
		Error::Refresh(RefreshError::Terminal { status: 400, ref details, .. })
			if details == "invalid_grant: Invalid JWT"
	));
}

#[tokio::test]
async fn error_statuses_are_responses_not_transport_failures() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).body("upstream overloaded");
		})
		.await;
	let uri = Url::parse(&server.url("/token")).expect("Mock URI should parse.");
	let request = TokenRequest::new(uri).with_field("k", "v").with_retry(false);
	let err = exchange::token_endpoint_request(&transport(), &request)
		.await
		.expect_err("503 is a failure.");

	mock.assert_calls_async(1).await;

	assert!(matches!(
		err,
		Error::Refresh(RefreshError::Retryable { status: 503, ref details, .. })
			if details == "upstream overloaded"
	));
}

#[tokio::test]
async fn redirects_are_not_followed() {
	let server = MockServer::start_async().await;
	let redirect = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(302).header("location", "/elsewhere");
		})
		.await;
	let uri = Url::parse(&server.url("/token")).expect("Mock URI should parse.");
	let err = exchange::token_endpoint_request(&transport(), &TokenRequest::new(uri))
		.await
		.expect_err("A redirect is not a token response.");

	redirect.assert_calls_async(1).await;

	assert!(matches!(err, Error::Refresh(RefreshError::Terminal { status: 302, .. })));
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("ya29.single", 3600));
		})
		.await;
	let shared = SharedCredential::new(
		fixture_builder()
			.token_uri(server.url("/token"))
			.build()
			.expect("Credential should build."),
	);
	let transport = transport();
	let (first, second) =
		tokio::join!(shared.access_token(&transport), shared.access_token(&transport));

	assert_eq!(first.expect("First caller should succeed.").expose(), "ya29.single");
	assert_eq!(second.expect("Second caller should succeed.").expose(), "ya29.single");

	mock.assert_calls_async(1).await;
}
