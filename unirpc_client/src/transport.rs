use std::time::Duration;

use async_trait::async_trait;
use unirpc_protocol::{BoxError, Metadata, TransportHint, TransportKind, Verb};

/// result type at the transport seam; causes cross it boxed and get wrapped
/// into `Error::Transport` by the facade.
pub type TransportResult<T> = std::result::Result<T, BoxError>;

/// transport-specific binding of a logical method name to its wire-level
/// address. the facade never interprets this, it only hands it to the
/// transport client that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodAdaptor {
    /// verb transports address a method by route and verb.
    Verb { route: String, verb: Verb },
    /// stream transports address a method by rpc name and streaming mode.
    Stream { rpc_name: String, streaming: bool },
}

impl MethodAdaptor {
    pub fn get(route: impl Into<String>) -> MethodAdaptor {
        MethodAdaptor::Verb {
            route: route.into(),
            verb: Verb::Get,
        }
    }

    pub fn post(route: impl Into<String>) -> MethodAdaptor {
        MethodAdaptor::Verb {
            route: route.into(),
            verb: Verb::Post,
        }
    }

    pub fn unary(rpc_name: impl Into<String>) -> MethodAdaptor {
        MethodAdaptor::Stream {
            rpc_name: rpc_name.into(),
            streaming: false,
        }
    }
}

/// per-call context handed to the transport client next to the payload.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub hint: TransportHint,
    pub metadata: Metadata,
    pub content_type: Option<String>,
    /// caller-supplied deadline, passed through untouched. the facade
    /// imposes no timeout of its own.
    pub deadline: Option<Duration>,
}

/// a wire transport serving one registered application id.
///
/// implementations own their connection resources and their own concurrency
/// discipline. errors cross this seam as boxed causes; the facade wraps them
/// into `Error::Transport`.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// which hint family this transport understands.
    fn kind(&self) -> TransportKind;

    /// performs one call. `body` is already serialized (or pass-through
    /// bytes); a `None` response body means the transport returned nothing.
    async fn call(
        &self,
        adaptor: &MethodAdaptor,
        body: Option<Vec<u8>>,
        ctx: CallContext,
    ) -> TransportResult<Option<Vec<u8>>>;

    /// releases connection resources. called exactly once, at registry
    /// shutdown.
    async fn close(&self) -> TransportResult<()>;
}
