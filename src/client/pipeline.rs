use std::sync::Arc;

use serde::Serialize;
use url::Url;

use super::interceptor::Interceptor;
use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::error::ApiError;

/// Transport wrapped in an ordered list of interceptors.
///
/// For every call:
/// 1. outgoing hooks run in registration order,
/// 2. the request is dispatched,
/// 3. incoming hooks run in reverse registration order,
/// 4. the original result is returned to the caller.
///
/// Cloning is cheap; clones share the transport and the interceptors.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ApiClient {
    /// Wrap a transport with no interceptors.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn base_url(&self) -> &Url {
        self.transport.base_url()
    }

    /// Send a fully described request through the pipeline.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        for interceptor in &self.interceptors {
            interceptor
                .on_request(&request.method, &request.path, &mut request.headers)
                .await;
        }

        let result = self.transport.send(request).await;

        for interceptor in self.interceptors.iter().rev() {
            match &result {
                Ok(response) => interceptor.on_response(response).await,
                Err(error) => interceptor.on_error(error).await,
            }
        }

        result
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::delete(path)).await
    }
}
