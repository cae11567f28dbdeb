//! Named interceptor pipeline wrapped around an [`HttpTransport`] call.
//!
//! Requests flow through interceptors in pipeline order; responses flow back in reverse order,
//! so the first interceptor sees the request first and the response last. Interceptors are
//! addressed by name, which lets callers replace, remove, or splice in their own stages without
//! rebuilding the whole chain.

pub mod headers;
pub mod log;
pub mod sign;
pub mod verify;

pub use headers::*;
pub use log::*;
pub use sign::*;
pub use verify::*;

// self
use crate::{
	_prelude::*,
	transport::{HttpRequest, HttpResponse, HttpTransport},
};

/// Name of the interceptor that sets `Accept`, `User-Agent`, and `Content-Type`.
pub const CLIENT_HEADERS: &str = "client_headers";
/// Name of the interceptor that signs requests.
pub const AUTHORIZE: &str = "authorize";
/// Name of the interceptor that verifies response signatures.
pub const VERIFY_SIGNATURE: &str = "verify_signature";
/// Name of the logging interceptor.
pub const LOG: &str = "log";

/// Future returned by [`Interceptor`] hooks.
pub type InterceptFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Stage of a [`Pipeline`].
///
/// Both hooks default to passing the message through untouched, so an interceptor only
/// implements the side it cares about. Returning an error aborts the call; a request error
/// means nothing is sent.
pub trait Interceptor
where
	Self: Send + Sync,
{
	/// Inspects or rewrites the outbound request.
	fn on_request(&self, request: HttpRequest) -> InterceptFuture<'_, HttpRequest> {
		Box::pin(std::future::ready(Ok(request)))
	}

	/// Inspects or rejects the inbound response.
	fn on_response(&self, response: HttpResponse) -> InterceptFuture<'_, HttpResponse> {
		Box::pin(std::future::ready(Ok(response)))
	}
}

#[derive(Clone)]
struct Stage {
	name: String,
	interceptor: Arc<dyn Interceptor>,
}

/// Ordered list of named interceptors.
#[derive(Clone, Default)]
pub struct Pipeline {
	stages: Vec<Stage>,
}
impl Pipeline {
	/// Creates an empty pipeline.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style [`Pipeline::push`].
	pub fn with(mut self, name: impl Into<String>, interceptor: Arc<dyn Interceptor>) -> Self {
		self.push(name, interceptor);

		self
	}

	/// Appends an interceptor; an existing stage with the same name is removed first.
	pub fn push(
		&mut self,
		name: impl Into<String>,
		interceptor: Arc<dyn Interceptor>,
	) -> &mut Self {
		let name = name.into();

		self.remove(&name);
		self.stages.push(Stage { name, interceptor });

		self
	}

	/// Swaps the interceptor registered under `name`, keeping its position.
	///
	/// Returns the previous interceptor, or `None` (and changes nothing) when `name` is unknown.
	pub fn replace(
		&mut self,
		name: &str,
		interceptor: Arc<dyn Interceptor>,
	) -> Option<Arc<dyn Interceptor>> {
		let stage = self.stages.iter_mut().find(|stage| stage.name == name)?;

		Some(std::mem::replace(&mut stage.interceptor, interceptor))
	}

	/// Removes the stage named `name`.
	pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Interceptor>> {
		let idx = self.position(name)?;

		Some(self.stages.remove(idx).interceptor)
	}

	/// Inserts a stage directly before `anchor`. Returns `false` when `anchor` is unknown.
	pub fn insert_before(
		&mut self,
		anchor: &str,
		name: impl Into<String>,
		interceptor: Arc<dyn Interceptor>,
	) -> bool {
		self.insert_at(anchor, 0, name.into(), interceptor)
	}

	/// Inserts a stage directly after `anchor`. Returns `false` when `anchor` is unknown.
	pub fn insert_after(
		&mut self,
		anchor: &str,
		name: impl Into<String>,
		interceptor: Arc<dyn Interceptor>,
	) -> bool {
		self.insert_at(anchor, 1, name.into(), interceptor)
	}

	fn insert_at(
		&mut self,
		anchor: &str,
		offset: usize,
		name: String,
		interceptor: Arc<dyn Interceptor>,
	) -> bool {
		if self.position(anchor).is_none() {
			return false;
		}

		self.remove(&name);

		match self.position(anchor) {
			Some(idx) => {
				self.stages.insert(idx + offset, Stage { name, interceptor });

				true
			},
			// `name == anchor`: the anchor itself was just removed.
			None => {
				self.stages.push(Stage { name, interceptor });

				true
			},
		}
	}

	fn position(&self, name: &str) -> Option<usize> {
		self.stages.iter().position(|stage| stage.name == name)
	}

	/// Looks up the interceptor registered under `name`.
	pub fn get(&self, name: &str) -> Option<&Arc<dyn Interceptor>> {
		self.stages.iter().find(|stage| stage.name == name).map(|stage| &stage.interceptor)
	}

	/// Whether a stage named `name` exists.
	pub fn contains(&self, name: &str) -> bool {
		self.position(name).is_some()
	}

	/// Stage names in execution order.
	pub fn names(&self) -> Vec<&str> {
		self.stages.iter().map(|stage| stage.name.as_str()).collect()
	}

	/// Number of stages.
	pub fn len(&self) -> usize {
		self.stages.len()
	}

	/// Whether the pipeline has no stages.
	pub fn is_empty(&self) -> bool {
		self.stages.is_empty()
	}

	/// Runs `request` through every stage, sends it, and runs the response back out.
	pub async fn execute(
		&self,
		transport: &dyn HttpTransport,
		mut request: HttpRequest,
	) -> Result<HttpResponse> {
		for stage in &self.stages {
			request = stage.interceptor.on_request(request).await?;
		}

		let mut response = transport.send(request).await?;

		for stage in self.stages.iter().rev() {
			response = stage.interceptor.on_response(response).await?;
		}

		Ok(response)
	}
}
impl Debug for Pipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Pipeline").field(&self.names()).finish()
	}
}
