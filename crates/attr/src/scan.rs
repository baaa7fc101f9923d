//! Chunked scans that follow select continuation tokens

use crate::client::AttributeClient;
use crate::item::from_attributes;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use vstore_core::{Record, RecordScan, Resource, Result};

/// [`RecordScan`] that follows select continuation tokens
///
/// Each chunk is one select response. The service holds no per-scan state,
/// so `close` only drops the token.
pub struct AttrScan<C> {
    client: Arc<C>,
    resource: Resource,
    expression: Option<String>,
    token: Option<String>,
    consistent_read: bool,
}

impl<C: AttributeClient> AttrScan<C> {
    /// `expression` of `None` yields nothing
    pub(crate) fn new(
        client: Arc<C>,
        resource: Resource,
        expression: Option<String>,
        consistent_read: bool,
    ) -> Self {
        Self {
            client,
            resource,
            expression,
            token: None,
            consistent_read,
        }
    }
}

#[async_trait]
impl<C: AttributeClient + 'static> RecordScan for AttrScan<C> {
    async fn next_chunk(&mut self) -> Result<Option<Vec<Record>>> {
        loop {
            let Some(expression) = self.expression.as_deref() else {
                return Ok(None);
            };
            let output = self
                .client
                .select(expression, self.token.as_deref(), self.consistent_read)
                .await?;
            debug!(
                target: "vstore::attr",
                domain = self.resource.name(),
                items = output.items.len(),
                "Fetched scan chunk"
            );
            self.token = output.next_token;
            if self.token.is_none() {
                self.expression = None;
            }
            if output.items.is_empty() {
                continue;
            }
            let records = output
                .items
                .iter()
                .map(|(item, attrs)| from_attributes(&self.resource, item, attrs))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(Some(records));
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Attributes;
    use crate::memory::MemoryAttributeClient;
    use vstore_core::{Field, Schema};

    fn resource() -> Resource {
        let schema = Schema::new()
            .field("id", Field::id())
            .field("rev", Field::text());
        Resource::new("items", schema, &["id"], "rev").unwrap()
    }

    async fn client(items: usize) -> Arc<MemoryAttributeClient> {
        let client = MemoryAttributeClient::new().with_max_items_per_response(2);
        client.create_domain("items").await.unwrap();
        for i in 0..items {
            let mut attrs = Attributes::new();
            attrs.insert("id".to_string(), format!("i{}", i));
            attrs.insert("rev".to_string(), "v".to_string());
            client
                .put_attributes("items", &format!("i{}", i), &attrs, None)
                .await
                .unwrap();
        }
        Arc::new(client)
    }

    #[tokio::test]
    async fn test_follows_tokens_to_the_end() {
        let client = client(5).await;
        let mut scan = AttrScan::new(
            client,
            resource(),
            Some("select * from `items` limit 10".to_string()),
            true,
        );
        let mut sizes = Vec::new();
        while let Some(chunk) = scan.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(scan.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_domain_and_no_expression() {
        let client = client(0).await;
        let mut scan = AttrScan::new(
            Arc::clone(&client),
            resource(),
            Some("select * from `items`".to_string()),
            true,
        );
        assert!(scan.next_chunk().await.unwrap().is_none());

        let mut nothing = AttrScan::new(client, resource(), None, true);
        assert!(nothing.next_chunk().await.unwrap().is_none());
        Box::new(nothing).close().await.unwrap();
    }
}
