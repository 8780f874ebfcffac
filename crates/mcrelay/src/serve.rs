//! The relay run loop.

use futures::stream::{FuturesUnordered, StreamExt};
use relay_core::{ChatGateway, CommandRelay};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Feeds invocations from `gateway` to `relay` until the gateway closes or
/// `shutdown` resolves, then waits for every in-flight invocation and
/// delivers its reply. Returns the number of invocations answered.
///
/// Invocations run concurrently, so a slow restart never holds up other
/// commands.
pub async fn serve<G, S>(gateway: &mut G, relay: Arc<CommandRelay>, shutdown: S) -> usize
where
    G: ChatGateway,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut in_flight = FuturesUnordered::new();
    let mut accepting = true;
    let mut answered = 0usize;

    loop {
        tokio::select! {
            _ = &mut shutdown, if accepting => {
                info!(
                    "Shutdown requested, finishing {} in-flight command(s)",
                    in_flight.len()
                );
                accepting = false;
            }
            next = gateway.next_invocation(), if accepting => match next {
                Some(invocation) => {
                    debug!(
                        "[{}] invoked [{}] with {} argument(s)",
                        invocation.identity, invocation.name, invocation.args.len()
                    );
                    let relay = relay.clone();
                    in_flight.push(async move {
                        let reply = relay.handle(&invocation).await;
                        (invocation, reply)
                    });
                }
                None => {
                    info!("Chat gateway closed");
                    accepting = false;
                }
            },
            Some((invocation, reply)) = in_flight.next(), if !in_flight.is_empty() => {
                answered += 1;
                if let Err(e) = gateway.reply(&invocation, &reply).await {
                    warn!("Failed to reply to [{}]: {}", invocation.identity, e);
                }
            }
            else => break,
        }
    }

    answered
}
