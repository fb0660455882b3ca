pub mod search;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

pub const CHECKOUT_TOKEN_HEADER: &str = "x-checkout-token";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Upstream credentials. A checkout token wins over an API key when both are present.
pub fn auth_headers(api_key: Option<&str>, checkout_token: Option<&str>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(token) = checkout_token.map(str::trim).filter(|token| !token.is_empty()) {
		headers.insert(HeaderName::from_static(CHECKOUT_TOKEN_HEADER), token.parse()?);

		return Ok(headers);
	}
	if let Some(key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
		let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))?;

		bearer.set_sensitive(true);

		headers.insert(HeaderName::from_static(API_KEY_HEADER), key.parse()?);
		headers.insert(AUTHORIZATION, bearer);
	}

	Ok(headers)
}
