mod common;

// std
use std::time::Duration as StdDuration;
// self
use common::{ScriptedTransport, TOKEN_URI, token_body};
use sa_token_refresh::{
	backoff::ExponentialBackoff,
	error::{Error, MalformedError, RefreshError, TransportError},
	exchange::{self, ResponsePayload, TokenRequest},
	obs::ClientInfo,
	url::Url,
};
use time::{Duration, OffsetDateTime};
use tokio::time::Instant;

fn grant_request() -> TokenRequest {
	let uri = Url::parse(TOKEN_URI).expect("Token URI should parse.");

	TokenRequest::jwt_bearer(uri, "header.payload.signature", &ClientInfo::new("1.85", "0.1.0"))
}

#[tokio::test(start_paused = true)]
async fn retryable_status_exhausts_backoff_after_four_calls() {
	let transport = ScriptedTransport::new([(503, "Service Unavailable")]);
	let started = Instant::now();
	let err = exchange::token_endpoint_request(&transport, &grant_request())
		.await
		.expect_err("A permanently unavailable endpoint must fail.");
	let elapsed = started.elapsed();

	assert_eq!(transport.calls(), 4);
	assert!(err.is_retryable());
	assert!(matches!(
		err,
		Error::Refresh(RefreshError::Retryable { status: 503, ref details, .. })
			if details == "Service Unavailable"
	));
	// 1s + 2s + 4s nominal, each within ±10%.
	assert!(elapsed >= StdDuration::from_millis(6_300), "{elapsed:?}");
	assert!(elapsed <= StdDuration::from_millis(7_700), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn disabled_retries_raise_after_one_call() {
	let transport = ScriptedTransport::new([(503, r#"{"error":"server_error"}"#)]);
	let started = Instant::now();
	let err = exchange::token_endpoint_request(&transport, &grant_request().with_retry(false))
		.await
		.expect_err("The endpoint is unavailable.");

	assert_eq!(transport.calls(), 1);
	assert_eq!(started.elapsed(), StdDuration::ZERO);
	assert!(matches!(err, Error::Refresh(RefreshError::Retryable { status: 503, .. })));
}

#[tokio::test(start_paused = true)]
async fn terminal_errors_are_not_retried() {
	let transport = ScriptedTransport::new([(
		400,
		r#"{"error":"invalid_grant","error_description":"Invalid JWT Signature"}"#,
	)]);
	let err = exchange::token_endpoint_request(&transport, &grant_request())
		.await
		.expect_err("invalid_grant is definitive.");

	assert_eq!(transport.calls(), 1);
	assert!(!err.is_retryable());

	let Error::Refresh(refresh) = err else {
		panic!("Unexpected error variant: {err:?}.");
	};

	assert_eq!(refresh.status(), 400);
	assert_eq!(
		refresh.to_string(),
		"Token endpoint rejected the request: invalid_grant: Invalid JWT Signature."
	);
	assert!(matches!(
		refresh.response(),
		ResponsePayload::Json(map) if map["error"] == "invalid_grant"
	));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover() {
	let transport = ScriptedTransport::new([
		(500, "oops".to_string()),
		(400, r#"{"error":"temporarily_unavailable"}"#.to_string()),
		(200, token_body("ya29.recovered", 3600)),
	]);
	let response = exchange::token_endpoint_request(&transport, &grant_request())
		.await
		.expect("Third attempt should succeed.");

	assert_eq!(transport.calls(), 3);
	assert_eq!(response["access_token"], "ya29.recovered");
}

#[tokio::test(start_paused = true)]
async fn terminal_failure_during_retries_stops_immediately() {
	let transport = ScriptedTransport::new([
		(429, "slow down"),
		(401, r#"{"error":"unauthorized_client","error_description":"nope"}"#),
		(200, "{}"),
	]);
	let err = exchange::token_endpoint_request(&transport, &grant_request())
		.await
		.expect_err("401 is definitive.");

	assert_eq!(transport.calls(), 2);
	assert!(matches!(err, Error::Refresh(RefreshError::Terminal { status: 401, .. })));
}

#[tokio::test(start_paused = true)]
async fn text_success_bodies_are_terminal() {
	let transport = ScriptedTransport::new([(200, "<html>ok</html>")]);
	let err = exchange::token_endpoint_request(&transport, &grant_request())
		.await
		.expect_err("A token response must be a JSON object.");

	assert_eq!(transport.calls(), 1);
	assert!(matches!(
		err,
		Error::Refresh(RefreshError::Terminal {
			status: 200,
			response: ResponsePayload::Text(_),
			..
		})
	));
}

#[tokio::test(start_paused = true)]
async fn deadline_cuts_backoff_short() {
	let transport = ScriptedTransport::new([(503, "busy")]);
	let request = grant_request().with_deadline(Some(Instant::now() + StdDuration::from_secs(2)));
	let started = Instant::now();
	let err = exchange::token_endpoint_request(&transport, &request)
		.await
		.expect_err("The deadline passes during the second wait.");

	assert!(matches!(err, Error::Transport(TransportError::DeadlineExceeded)));
	assert_eq!(transport.calls(), 2);

	let elapsed = started.elapsed();

	assert!(elapsed >= StdDuration::from_secs(2), "{elapsed:?}");
	assert!(elapsed < StdDuration::from_millis(2_010), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn custom_backoff_controls_attempts() {
	let transport = ScriptedTransport::new([(500, "down")]);
	let backoff = ExponentialBackoff::new(1, StdDuration::from_millis(10), 0.0, 2.0)
		.expect("Parameters are valid.");
	let _ = exchange::token_endpoint_request(&transport, &grant_request().with_backoff(backoff))
		.await
		.expect_err("The endpoint stays down.");

	assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn request_carries_grant_body_and_headers() {
	let transport = ScriptedTransport::new([(200, token_body("t", 60))]);
	let request = grant_request()
		.with_header("x-goog-api-client", "overridden")
		.with_timeout(StdDuration::from_secs(5));
	let _ = exchange::token_endpoint_request(&transport, &request)
		.await
		.expect("Request should succeed.");
	let sent = &transport.requests()[0];

	assert_eq!(sent.method, "POST");
	assert_eq!(sent.uri, TOKEN_URI);
	assert_eq!(sent.timeout, StdDuration::from_secs(5));
	assert_eq!(sent.headers["content-type"], "application/x-www-form-urlencoded");
	assert_eq!(sent.headers["x-goog-api-client"], "overridden");
	assert_eq!(sent.headers.get_all("x-goog-api-client").iter().count(), 1);
	assert_eq!(
		sent.form(),
		[
			("assertion".to_string(), "header.payload.signature".to_string()),
			(
				"grant_type".to_string(),
				"urn:ietf:params:oauth:grant-type:jwt-bearer".to_string()
			),
		]
	);
}

#[tokio::test]
async fn jwt_grant_extracts_token_and_expiry() {
	let transport = ScriptedTransport::new([(
		200,
		r#"{"access_token":"ya29.string","expires_in":"3600","scope":"a"}"#,
	)]);
	let before = OffsetDateTime::now_utc();
	let grant = exchange::jwt_grant(&transport, &grant_request())
		.await
		.expect("Grant should succeed.");
	let after = OffsetDateTime::now_utc();
	let expiry = grant.expiry.expect("expires_in was present.");

	assert_eq!(grant.access_token.expose(), "ya29.string");
	assert!(expiry >= before + Duration::seconds(3600));
	assert!(expiry <= after + Duration::seconds(3600));
	assert_eq!(grant.response["scope"], "a");
}

#[tokio::test]
async fn jwt_grant_without_expires_in_has_no_expiry() {
	let transport = ScriptedTransport::new([(200, r#"{"access_token":"forever"}"#)]);
	let grant = exchange::jwt_grant(&transport, &grant_request())
		.await
		.expect("Grant should succeed.");

	assert_eq!(grant.expiry, None);
}

#[tokio::test]
async fn jwt_grant_rejects_missing_token_and_bad_expiry() {
	let transport = ScriptedTransport::new([(200, r#"{"expires_in":3600}"#)]);
	let err = exchange::jwt_grant(&transport, &grant_request())
		.await
		.expect_err("No access token was issued.");

	assert!(matches!(
		err,
		Error::Refresh(RefreshError::Terminal { status: 200, ref details, .. })
			if details == "No access token in response"
	));

	let transport =
		ScriptedTransport::new([(200, r#"{"access_token":"t","expires_in":"one hour"}"#)]);
	let err = exchange::jwt_grant(&transport, &grant_request())
		.await
		.expect_err("expires_in is not an integer.");

	assert!(matches!(err, Error::Malformed(MalformedError::ExpiresIn { .. })));
}
