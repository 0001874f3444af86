//! Network transport seam.
//!
//! The engine never talks to the network directly; it goes through a
//! [`Transport`]. An `Ok` response may carry any status; an `Err` means no
//! response was obtainable at all.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::request::ResourceRequest;
use crate::response::Response;

pub use http::HttpTransport;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn fetch(&self, request: &ResourceRequest) -> TransportResult<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, request: &ResourceRequest) -> TransportResult<Response> {
        (**self).fetch(request).await
    }
}
