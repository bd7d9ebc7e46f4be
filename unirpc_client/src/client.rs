use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use unirpc_protocol::{
    codec, Body, Error, InvokeRequest, Metadata, RequestParts, Result, SerializeType,
    TransportHint,
};

use crate::registry::ServiceRegistry;
use crate::transport::CallContext;

#[derive(Debug, Copy, Clone)]
pub struct Opt {
    /// serialize type used when a request carries no content type.
    pub serialize_type: SerializeType,
}

impl Default for Opt {
    fn default() -> Self {
        Opt {
            serialize_type: SerializeType::JSON,
        }
    }
}

/// the unified invocation surface.
///
/// every public entry point funnels into one canonical dispatch, so the
/// wrappers only differ in how the request body was supplied and in what
/// shape the reply is handed back (typed value, pass-through bytes, or
/// nothing).
///
/// the registry is an explicit constructor dependency; the facade never
/// builds a transport client itself.
pub struct RpcClient {
    registry: ServiceRegistry,
    opt: Opt,
}

impl RpcClient {
    pub fn new(registry: ServiceRegistry) -> RpcClient {
        RpcClient::with_opt(registry, Opt::default())
    }

    pub fn with_opt(registry: ServiceRegistry, opt: Opt) -> RpcClient {
        RpcClient { registry, opt }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// releases every transport client owned by the registry.
    pub async fn shutdown(&self) -> Result<()> {
        self.registry.shutdown().await
    }

    /// invokes a method and decodes the reply into `T`.
    pub async fn invoke<B, T>(&self, request: InvokeRequest<B>) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let st = self.negotiate(request.content_type())?;
        let reply = self.dispatch(request, None).await?;
        decode(st, reply)
    }

    /// like [`RpcClient::invoke`], but settles with `Error::Cancelled` when
    /// the token fires first. the in-flight transport call is dropped and no
    /// deserialization runs afterwards.
    pub async fn invoke_with_cancel<B, T>(
        &self,
        request: InvokeRequest<B>,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let st = self.negotiate(request.content_type())?;
        let reply = self.dispatch(request, Some(cancel)).await?;
        decode(st, reply)
    }

    /// invokes a method and discards any reply body. transport errors still
    /// surface.
    pub async fn invoke_unit<B>(&self, request: InvokeRequest<B>) -> Result<()>
    where
        B: Serialize,
    {
        self.dispatch(request, None).await.map(|_| ())
    }

    pub async fn invoke_unit_with_cancel<B>(
        &self,
        request: InvokeRequest<B>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        B: Serialize,
    {
        self.dispatch(request, Some(cancel)).await.map(|_| ())
    }

    /// invokes a method and returns the reply bytes untouched. the
    /// serializer is never involved on the response side. `None` means the
    /// transport completed without a body, as opposed to an empty payload.
    pub async fn invoke_raw<B>(&self, request: InvokeRequest<B>) -> Result<Option<Vec<u8>>>
    where
        B: Serialize,
    {
        self.dispatch(request, None).await
    }

    pub async fn invoke_raw_with_cancel<B>(
        &self,
        request: InvokeRequest<B>,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>>
    where
        B: Serialize,
    {
        self.dispatch(request, Some(cancel)).await
    }

    /// convenience wrapper: typed body, typed reply.
    pub async fn invoke_method<B, T>(
        &self,
        app_id: &str,
        method: &str,
        body: B,
        hint: TransportHint,
    ) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let request = InvokeRequest::builder(app_id, method)
            .body(body)
            .hint(hint)
            .build()?;
        self.invoke(request).await
    }

    /// convenience wrapper: bytes in, bytes out, serializer fully bypassed.
    pub async fn invoke_binary(
        &self,
        app_id: &str,
        method: &str,
        data: Vec<u8>,
        hint: TransportHint,
        metadata: Metadata,
    ) -> Result<Option<Vec<u8>>> {
        let request = InvokeRequest::builder(app_id, method)
            .raw_body(data)
            .hint(hint)
            .metadata_map(metadata)
            .build()?;
        self.invoke_raw(request).await
    }

    /// the canonical operation all overloads reduce to: resolve the entry,
    /// check hint/transport consistency, serialize the body unless it is
    /// raw or empty, delegate to the transport client, hand back the raw
    /// reply bytes.
    async fn dispatch<B>(
        &self,
        request: InvokeRequest<B>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Vec<u8>>>
    where
        B: Serialize,
    {
        let RequestParts {
            app_id,
            method,
            body,
            hint,
            metadata,
            mut content_type,
            deadline,
        } = request.into_parts();
        let entry = self.registry.resolve(&app_id)?;
        let adaptor = entry.adaptor(&method)?;
        let client = entry.client();

        if !hint.accepts(client.kind()) {
            return Err(Error::configuration(format!(
                "transport hint {:?} does not match the {} transport registered for app id `{}`",
                hint.kind(),
                client.kind(),
                app_id
            )));
        }

        debug!(
            app_id = app_id.as_str(),
            method = method.as_str(),
            "dispatching call"
        );

        let body = match body {
            Body::Empty => None,
            // raw bytes pass through, the serializer never runs
            Body::Raw(data) => Some(data),
            Body::Typed(value) => {
                let st = self.negotiate(content_type.as_deref())?;
                content_type = Some(st.content_type().to_owned());
                Some(codec::to_bytes(st, &value)?)
            }
        };

        let ctx = CallContext {
            hint,
            metadata,
            content_type,
            deadline,
        };

        let call = client.call(adaptor, body, ctx);
        let reply = match cancel {
            None => call.await,
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    reply = call => reply,
                }
            }
        };

        reply.map_err(|err| Error::transport(&app_id, err))
    }

    fn negotiate(&self, content_type: Option<&str>) -> Result<SerializeType> {
        match content_type {
            None => Ok(self.opt.serialize_type),
            Some(ct) => SerializeType::from_content_type(ct)
                .ok_or_else(|| Error::configuration(format!("unsupported content type `{}`", ct))),
        }
    }
}

fn decode<T>(st: SerializeType, reply: Option<Vec<u8>>) -> Result<T>
where
    T: DeserializeOwned,
{
    match reply {
        Some(data) => codec::from_slice(st, &data),
        None => Err(Error::deserialization(
            st.content_type(),
            "transport returned no response body",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::transport::{MethodAdaptor, TransportClient, TransportResult};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use unirpc_protocol::{ErrorKind, TransportKind};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Charge {
        amount: u64,
    }

    /// echoes the request body back and counts how often it was reached.
    struct EchoClient {
        kind: TransportKind,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TransportClient for EchoClient {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        async fn call(
            &self,
            _adaptor: &MethodAdaptor,
            body: Option<Vec<u8>>,
            _ctx: CallContext,
        ) -> TransportResult<Option<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(body)
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    struct SlowClient;

    #[async_trait]
    impl TransportClient for SlowClient {
        fn kind(&self) -> TransportKind {
            TransportKind::Stream
        }

        async fn call(
            &self,
            _adaptor: &MethodAdaptor,
            _body: Option<Vec<u8>>,
            _ctx: CallContext,
        ) -> TransportResult<Option<Vec<u8>>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some(b"too late".to_vec()))
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl TransportClient for FailingClient {
        fn kind(&self) -> TransportKind {
            TransportKind::Verb
        }

        async fn call(
            &self,
            _adaptor: &MethodAdaptor,
            _body: Option<Vec<u8>>,
            _ctx: CallContext,
        ) -> TransportResult<Option<Vec<u8>>> {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )
            .into())
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    fn echo_client(kind: TransportKind) -> (RpcClient, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut methods = HashMap::new();
        methods.insert("charge".to_owned(), MethodAdaptor::post("/charge"));
        let mut builder = RegistryBuilder::new();
        builder
            .register_service(
                "billing",
                Box::new(EchoClient {
                    kind,
                    calls: calls.clone(),
                }),
                methods,
            )
            .unwrap();
        (RpcClient::new(builder.seal()), calls)
    }

    #[tokio::test]
    async fn typed_body_round_trips_through_serializer() {
        let (client, calls) = echo_client(TransportKind::Verb);
        let reply: Charge = client
            .invoke_method("billing", "charge", Charge { amount: 100 }, TransportHint::None)
            .await
            .unwrap();
        assert_eq!(Charge { amount: 100 }, reply);
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn raw_bytes_bypass_the_serializer() {
        let (client, _) = echo_client(TransportKind::Verb);
        // not decodable by any configured codec, so a serializer touch
        // would fail the call
        let junk = vec![0xff, 0x00, 0x13, 0x37];
        let reply = client
            .invoke_binary(
                "billing",
                "charge",
                junk.clone(),
                TransportHint::None,
                Metadata::new(),
            )
            .await
            .unwrap();
        assert_eq!(Some(junk), reply);
    }

    /// one transport answers with no body at all, the other with a present
    /// but empty payload; the raw path must keep the two apart.
    #[tokio::test]
    async fn raw_reply_distinguishes_no_body_from_empty_bytes() {
        struct FixedClient {
            reply: Option<Vec<u8>>,
        }

        #[async_trait]
        impl TransportClient for FixedClient {
            fn kind(&self) -> TransportKind {
                TransportKind::Verb
            }

            async fn call(
                &self,
                _adaptor: &MethodAdaptor,
                _body: Option<Vec<u8>>,
                _ctx: CallContext,
            ) -> TransportResult<Option<Vec<u8>>> {
                Ok(self.reply.clone())
            }

            async fn close(&self) -> TransportResult<()> {
                Ok(())
            }
        }

        let mut methods = HashMap::new();
        methods.insert("charge".to_owned(), MethodAdaptor::post("/charge"));
        let mut builder = RegistryBuilder::new();
        builder
            .register_service("bodyless", Box::new(FixedClient { reply: None }), methods.clone())
            .unwrap();
        builder
            .register_service(
                "empty",
                Box::new(FixedClient {
                    reply: Some(Vec::new()),
                }),
                methods,
            )
            .unwrap();
        let client = RpcClient::new(builder.seal());

        let from_none = client
            .invoke_raw(InvokeRequest::builder("bodyless", "charge").build().unwrap())
            .await
            .unwrap();
        let from_empty = client
            .invoke_raw(InvokeRequest::builder("empty", "charge").build().unwrap())
            .await
            .unwrap();

        assert_eq!(None, from_none);
        assert_eq!(Some(Vec::new()), from_empty);
        assert_ne!(from_none, from_empty);
    }

    #[tokio::test]
    async fn unit_result_discards_reply_bytes() {
        let (client, _) = echo_client(TransportKind::Verb);
        let request = InvokeRequest::builder("billing", "charge")
            .raw_body(b"non-empty reply".to_vec())
            .build()
            .unwrap();
        client.invoke_unit(request).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let (client, calls) = echo_client(TransportKind::Verb);
        let request = InvokeRequest::builder("billing", "refund").build().unwrap();
        let err = client.invoke_unit(request).await.unwrap_err();
        assert_eq!(ErrorKind::UnknownMethod, err.kind());
        assert_eq!(0, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn mismatched_hint_is_a_configuration_error() {
        let (client, calls) = echo_client(TransportKind::Verb);
        let request = InvokeRequest::builder("billing", "charge")
            .hint(TransportHint::Stream {
                metadata: Metadata::new(),
            })
            .build()
            .unwrap();
        let err = client.invoke_unit(request).await.unwrap_err();
        assert_eq!(ErrorKind::Configuration, err.kind());
        assert_eq!(0, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn msgpack_content_type_drives_negotiation() {
        let (client, _) = echo_client(TransportKind::Verb);
        let request = InvokeRequest::builder("billing", "charge")
            .body(Charge { amount: 7 })
            .content_type("application/msgpack")
            .build()
            .unwrap();
        let reply: Charge = client.invoke(request).await.unwrap();
        assert_eq!(Charge { amount: 7 }, reply);
    }

    #[tokio::test]
    async fn unsupported_content_type_is_rejected() {
        let (client, _) = echo_client(TransportKind::Verb);
        let request = InvokeRequest::builder("billing", "charge")
            .body(Charge { amount: 7 })
            .content_type("text/plain")
            .build()
            .unwrap();
        let err = client.invoke::<_, Charge>(request).await.unwrap_err();
        assert_eq!(ErrorKind::Configuration, err.kind());
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped_with_cause() {
        let mut methods = HashMap::new();
        methods.insert("charge".to_owned(), MethodAdaptor::post("/charge"));
        let mut builder = RegistryBuilder::new();
        builder
            .register_service("billing", Box::new(FailingClient), methods)
            .unwrap();
        let client = RpcClient::new(builder.seal());

        let request = InvokeRequest::builder("billing", "charge").build().unwrap();
        let err = client.invoke_unit(request).await.unwrap_err();
        assert_eq!(ErrorKind::Transport, err.kind());
        let source = std::error::Error::source(&err).expect("cause preserved");
        assert!(source.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn cancellation_settles_as_cancelled() {
        let mut methods = HashMap::new();
        methods.insert("watch".to_owned(), MethodAdaptor::unary("Watch"));
        let mut builder = RegistryBuilder::new();
        builder
            .register_service("monitor", Box::new(SlowClient), methods)
            .unwrap();
        let client = RpcClient::new(builder.seal());

        let token = CancellationToken::new();
        let request = InvokeRequest::builder("monitor", "watch").build().unwrap();
        let invocation = client.invoke_with_cancel::<_, Charge>(request, &token);
        tokio::pin!(invocation);

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(10)) => token.cancel(),
            _ = &mut invocation => panic!("call must not settle before the cancel"),
        }

        let err = invocation.await.unwrap_err();
        assert_eq!(ErrorKind::Cancelled, err.kind());
    }

    #[tokio::test]
    async fn each_invoke_reaches_the_transport_exactly_once() {
        let (client, calls) = echo_client(TransportKind::Verb);
        for round in 1..=3u64 {
            let _: Charge = client
                .invoke_method("billing", "charge", Charge { amount: round }, TransportHint::None)
                .await
                .unwrap();
            assert_eq!(round as usize, calls.load(Ordering::SeqCst));
        }
    }
}
