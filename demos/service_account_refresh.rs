//! Refreshes a service-account credential against a mock token endpoint with the default reqwest
//! transport, then shares it between concurrent callers.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use sa_token_refresh::{
	credential::{CredentialBuilder, SharedCredential},
	http::ReqwestTransport,
	oauth2::http::HeaderMap,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let credential = CredentialBuilder::from_service_account_json(include_str!(
		"../tests/fixtures/service_account.json"
	))?
	.token_uri(server.url("/token"))
	.scopes(["https://www.googleapis.com/auth/cloud-platform"])
	.build()?;
	let shared = SharedCredential::new(credential);
	let transport = ReqwestTransport::new()?;
	let (first, second) =
		tokio::join!(shared.access_token(&transport), shared.access_token(&transport));
	let mut headers = HeaderMap::new();

	shared.apply(&transport, &mut headers).await?;

	println!("Tokens match: {}.", first? == second?);
	println!("Authorization header set: {}.", headers.contains_key("authorization"));
	println!("Token endpoint calls: {}.", shared.metrics().refreshes());

	token_mock.assert_calls_async(1).await;

	Ok(())
}
