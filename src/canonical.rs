//! Canonical message construction shared by request signing and response verification.
//!
//! Every field is terminated by a single `\n`, the last one included. Any deviation yields
//! a different byte string and therefore a signature that fails to verify, so malformed input
//! is never rejected here: it simply fails closed downstream.

/// Fields hashed when signing an outbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanonicalRequest<'a> {
	/// HTTP method as sent on the wire.
	pub method: &'a str,
	/// Request target (`path` plus optional `?query`).
	pub request_target: &'a str,
	/// Unix timestamp in seconds, rendered in decimal.
	pub timestamp: &'a str,
	/// Per-request nonce.
	pub nonce: &'a str,
	/// Raw request body; ignored for `GET`.
	pub body: &'a [u8],
}
impl CanonicalRequest<'_> {
	/// Returns the body that participates in the signature (empty for `GET`).
	pub fn signed_body(&self) -> &[u8] {
		if self.method.eq_ignore_ascii_case("GET") { &[] } else { self.body }
	}

	/// Renders the exact byte sequence to sign.
	pub fn to_bytes(&self) -> Vec<u8> {
		let body = self.signed_body();
		let mut buf = Vec::with_capacity(
			self.method.len()
				+ self.request_target.len()
				+ self.timestamp.len()
				+ self.nonce.len()
				+ body.len()
				+ 5,
		);

		for field in [
			self.method.as_bytes(),
			self.request_target.as_bytes(),
			self.timestamp.as_bytes(),
			self.nonce.as_bytes(),
			body,
		] {
			buf.extend_from_slice(field);
			buf.push(b'\n');
		}

		buf
	}
}

/// Fields hashed when verifying an inbound response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanonicalResponse<'a> {
	/// Value of `Wechatpay-Timestamp`.
	pub timestamp: &'a str,
	/// Value of `Wechatpay-Nonce`.
	pub nonce: &'a str,
	/// Full response body.
	pub body: &'a [u8],
}
impl CanonicalResponse<'_> {
	/// Renders the exact byte sequence the platform signed.
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut buf =
			Vec::with_capacity(self.timestamp.len() + self.nonce.len() + self.body.len() + 3);

		for field in [self.timestamp.as_bytes(), self.nonce.as_bytes(), self.body] {
			buf.extend_from_slice(field);
			buf.push(b'\n');
		}

		buf
	}
}

/// Builds the canonical request string; `body` is dropped when `method` is `GET`.
pub fn build_request_string(
	method: &str,
	request_target: &str,
	timestamp: &str,
	nonce: &str,
	body: &str,
) -> String {
	let body = if method.eq_ignore_ascii_case("GET") { "" } else { body };

	format!("{method}\n{request_target}\n{timestamp}\n{nonce}\n{body}\n")
}

/// Builds the canonical response string.
pub fn build_response_string(timestamp: &str, nonce: &str, body: &str) -> String {
	format!("{timestamp}\n{nonce}\n{body}\n")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const BODY: &str = r#"{"foo":"bar"}"#;

	#[test]
	fn request_string_keeps_body_for_non_get_methods() {
		for method in ["POST", "PUT", "PATCH", "DELETE"] {
			assert_eq!(
				build_request_string(method, "api/v3/foobar", "1629874820", "nonce", BODY),
				format!("{method}\napi/v3/foobar\n1629874820\nnonce\n{BODY}\n")
			);
		}
	}

	#[test]
	fn get_requests_always_sign_an_empty_body() {
		for method in ["GET", "get", "Get"] {
			for body in ["", BODY, "\n", "ignored"] {
				let rendered = build_request_string(method, "/v3/certificates", "1", "n", body);

				assert_eq!(rendered, format!("{method}\n/v3/certificates\n1\nn\n\n"));
				assert!(rendered.ends_with("\n\n"));
			}
		}
	}

	#[test]
	fn byte_forms_match_string_forms() {
		let request = CanonicalRequest {
			method: "POST",
			request_target: "/v3/pay/transactions/native?x=1",
			timestamp: "1629874820",
			nonce: "88f7b2d9e69126b70467c29b5408736f",
			body: BODY.as_bytes(),
		};

		assert_eq!(
			request.to_bytes(),
			build_request_string(
				request.method,
				request.request_target,
				request.timestamp,
				request.nonce,
				BODY,
			)
			.into_bytes()
		);

		let get = CanonicalRequest { method: "get", ..request };

		assert!(get.signed_body().is_empty());
		assert!(get.to_bytes().ends_with(b"\n\n"));

		let response =
			CanonicalResponse { timestamp: "1629874820", nonce: "abc", body: BODY.as_bytes() };

		assert_eq!(
			response.to_bytes(),
			build_response_string("1629874820", "abc", BODY).into_bytes()
		);
	}

	#[test]
	fn response_string_terminates_every_field() {
		assert_eq!(build_response_string("1", "n", ""), "1\nn\n\n");
		assert_eq!(build_response_string("1", "n", "x").matches('\n').count(), 3);
	}
}
