use std::collections::HashMap;
use std::time::Duration;

use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};

/// metadata (in streaming transports) or headers (in verb transports) sent
/// along with a call.
pub type Metadata = HashMap<String, String>;

#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, Hash, EnumIter, EnumString)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
    Connect,
}

/// the two families of wire transports a service entry can be backed by.
#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString)]
pub enum TransportKind {
    Verb,
    Stream,
}

/// transport-specific addressing carried on a request.
///
/// `None` is the transport-neutral default: the same request can then drive
/// either a verb-based or a metadata-based transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportHint {
    None,
    Verb { verb: Verb, headers: Metadata },
    Stream { metadata: Metadata },
}

impl TransportHint {
    pub fn get(route_headers: Metadata) -> TransportHint {
        TransportHint::Verb {
            verb: Verb::Get,
            headers: route_headers,
        }
    }

    pub fn post(route_headers: Metadata) -> TransportHint {
        TransportHint::Verb {
            verb: Verb::Post,
            headers: route_headers,
        }
    }

    pub fn kind(&self) -> Option<TransportKind> {
        match self {
            TransportHint::None => None,
            TransportHint::Verb { .. } => Some(TransportKind::Verb),
            TransportHint::Stream { .. } => Some(TransportKind::Stream),
        }
    }

    /// a hint is compatible with a transport when it is neutral or of the
    /// same kind. a mismatch is a configuration error, not a retry case.
    pub fn accepts(&self, kind: TransportKind) -> bool {
        match self.kind() {
            None => true,
            Some(own) => own == kind,
        }
    }
}

impl Default for TransportHint {
    fn default() -> Self {
        TransportHint::None
    }
}

/// the request-side payload: nothing, pass-through bytes, or a typed value
/// serialized by the facade before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Body<B> {
    Empty,
    Raw(Vec<u8>),
    Typed(B),
}

impl<B> Body<B> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Body::Raw(_))
    }
}

/// one logical call, immutable after `build()`.
#[derive(Debug, Clone)]
pub struct InvokeRequest<B = ()> {
    app_id: String,
    method: String,
    body: Body<B>,
    hint: TransportHint,
    metadata: Metadata,
    content_type: Option<String>,
    deadline: Option<Duration>,
}

impl InvokeRequest<()> {
    pub fn builder(
        app_id: impl Into<String>,
        method: impl Into<String>,
    ) -> InvokeRequestBuilder<()> {
        InvokeRequestBuilder {
            app_id: app_id.into(),
            method: method.into(),
            body: Body::Empty,
            hint: TransportHint::None,
            metadata: Metadata::new(),
            content_type: None,
            deadline: None,
        }
    }
}

impl<B> InvokeRequest<B> {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn body(&self) -> &Body<B> {
        &self.body
    }

    pub fn hint(&self) -> &TransportHint {
        &self.hint
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn into_parts(self) -> RequestParts<B> {
        RequestParts {
            app_id: self.app_id,
            method: self.method,
            body: self.body,
            hint: self.hint,
            metadata: self.metadata,
            content_type: self.content_type,
            deadline: self.deadline,
        }
    }
}

/// a request destructured for dispatch.
#[derive(Debug)]
pub struct RequestParts<B> {
    pub app_id: String,
    pub method: String,
    pub body: Body<B>,
    pub hint: TransportHint,
    pub metadata: Metadata,
    pub content_type: Option<String>,
    pub deadline: Option<Duration>,
}

#[derive(Debug)]
pub struct InvokeRequestBuilder<B> {
    app_id: String,
    method: String,
    body: Body<B>,
    hint: TransportHint,
    metadata: Metadata,
    content_type: Option<String>,
    deadline: Option<Duration>,
}

impl<B> InvokeRequestBuilder<B> {
    /// sets a typed body, serialized by the facade at dispatch time.
    pub fn body<T>(self, body: T) -> InvokeRequestBuilder<T> {
        InvokeRequestBuilder {
            app_id: self.app_id,
            method: self.method,
            body: Body::Typed(body),
            hint: self.hint,
            metadata: self.metadata,
            content_type: self.content_type,
            deadline: self.deadline,
        }
    }

    /// sets pass-through bytes, never touched by the serializer.
    pub fn raw_body(mut self, data: Vec<u8>) -> Self {
        self.body = Body::Raw(data);
        self
    }

    pub fn hint(mut self, hint: TransportHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn build(self) -> Result<InvokeRequest<B>> {
        if self.app_id.is_empty() {
            return Err(Error::configuration("app id must not be empty"));
        }
        if self.method.is_empty() {
            return Err(Error::configuration("method name must not be empty"));
        }
        Ok(InvokeRequest {
            app_id: self.app_id,
            method: self.method,
            body: self.body,
            hint: self.hint,
            metadata: self.metadata,
            content_type: self.content_type,
            deadline: self.deadline,
        })
    }
}
