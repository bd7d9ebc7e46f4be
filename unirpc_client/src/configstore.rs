//! configuration-store collaborator: an example of an external push-update
//! source the sdk consumes. it sits outside the invocation core; nothing in
//! the facade depends on it.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use unirpc_protocol::{Metadata, Result};

/// one configuration entry as returned by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationItem {
    pub key: String,
    pub content: Option<String>,
    pub group: String,
    pub label: String,
    pub tags: Metadata,
    pub metadata: Metadata,
}

/// one change notification pushed by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeResp {
    pub app_id: String,
    pub store_name: String,
    pub items: Vec<ConfigurationItem>,
}

/// a configuration store: point reads plus a lazy, infinite change feed.
///
/// `subscribe` builds a fresh stream on every call, so dropping a
/// subscription and subscribing again restarts the feed.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    fn store_name(&self) -> &str;

    async fn fetch(
        &self,
        app_id: &str,
        keys: &[String],
        metadata: &Metadata,
    ) -> Result<Vec<ConfigurationItem>>;

    fn subscribe(
        &self,
        app_id: &str,
        keys: &[String],
        metadata: &Metadata,
    ) -> BoxStream<'static, SubscribeResp>;
}

const DEFAULT_GROUP: &str = "default";
const DEFAULT_LABEL: &str = "default";

/// a toy store that answers every fetch with a single `test` item and emits
/// a change notification at a fixed interval. illustrative only.
pub struct DemoConfigStore {
    store_name: String,
    interval: Duration,
}

impl DemoConfigStore {
    pub fn new(store_name: impl Into<String>) -> DemoConfigStore {
        DemoConfigStore {
            store_name: store_name.into(),
            interval: Duration::from_secs(3),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> DemoConfigStore {
        self.interval = interval;
        self
    }

    fn item(key: String, metadata: &Metadata) -> ConfigurationItem {
        ConfigurationItem {
            key,
            content: None,
            group: DEFAULT_GROUP.to_owned(),
            label: DEFAULT_LABEL.to_owned(),
            tags: metadata.clone(),
            metadata: metadata.clone(),
        }
    }
}

#[async_trait]
impl ConfigStore for DemoConfigStore {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    async fn fetch(
        &self,
        _app_id: &str,
        _keys: &[String],
        metadata: &Metadata,
    ) -> Result<Vec<ConfigurationItem>> {
        Ok(vec![Self::item("test".to_owned(), metadata)])
    }

    fn subscribe(
        &self,
        app_id: &str,
        _keys: &[String],
        metadata: &Metadata,
    ) -> BoxStream<'static, SubscribeResp> {
        let app_id = app_id.to_owned();
        let store_name = self.store_name.clone();
        let metadata = metadata.clone();
        let interval = self.interval;

        stream::unfold(0u64, move |seq| {
            let app_id = app_id.clone();
            let store_name = store_name.clone();
            let metadata = metadata.clone();
            async move {
                tokio::time::sleep(interval).await;
                let resp = SubscribeResp {
                    app_id,
                    store_name,
                    items: vec![Self::item(format!("test{}", seq), &metadata)],
                };
                Some((resp, seq + 1))
            }
        })
        .boxed()
    }
}
