use std::fmt;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use bytes::BytesMut;
use futures::stream::BoxStream;
use futures::StreamExt;

use super::node::GraphQLResponse;
use super::template::InputTemplate;
use super::Context;
use super::Resolver;
use crate::error::FetchError;
use crate::error::ResolveError;

/// An upstream source of subscription events.
#[async_trait]
pub trait SubscriptionDataSource: Send + Sync {
    /// Start the event stream for the rendered trigger input. Each item is
    /// the raw JSON payload of one event.
    async fn start(
        &self,
        ctx: &Context,
        input: &[u8],
    ) -> Result<BoxStream<'static, Bytes>, FetchError>;

    fn unique_identifier(&self) -> &[u8];
}

/// How to start a subscription's event stream.
#[derive(Clone)]
pub struct SubscriptionTrigger {
    pub input_template: InputTemplate,
    pub source: Arc<dyn SubscriptionDataSource>,
}

impl fmt::Debug for SubscriptionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionTrigger")
            .field(
                "source",
                &String::from_utf8_lossy(self.source.unique_identifier()),
            )
            .finish()
    }
}

/// A subscription plan: a trigger plus the response tree applied to each
/// event.
#[derive(Debug, Clone)]
pub struct GraphQLSubscription {
    pub trigger: SubscriptionTrigger,
    pub response: GraphQLResponse,
}

impl Resolver {
    /// Resolve each subscription event through the response plan, writing
    /// and flushing one envelope per event. Returns when the stream ends or
    /// the context is canceled; the transport around this call owns
    /// connection lifecycle.
    pub async fn resolve_graphql_subscription<W: Write>(
        &self,
        ctx: &Context,
        subscription: &GraphQLSubscription,
        writer: &mut W,
    ) -> Result<(), ResolveError> {
        let mut input = BytesMut::new();
        subscription
            .trigger
            .input_template
            .render(ctx, b"", &mut input)?;
        let mut events = subscription.trigger.source.start(ctx, &input).await?;

        loop {
            let event = tokio::select! {
                _ = ctx.cancellation.cancelled() => return Ok(()),
                event = events.next() => match event {
                    Some(event) => event,
                    None => return Ok(()),
                },
            };
            self.resolve_graphql_response(ctx, &subscription.response, &event, writer)
                .await?;
            writer.flush().map_err(|err| ResolveError::ResponseWrite {
                reason: err.to_string(),
            })?;
        }
    }
}
