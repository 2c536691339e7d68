//! Single-flight coalescing of identical data source loads.
//!
//! Concurrent fetches with the same `(unique_identifier, prepared_input)`
//! key share one load: the first caller becomes the leader and performs it,
//! everyone else subscribes to the key's broadcast channel and copies the
//! published bytes. The channel and the frozen [`Bytes`] it carries keep the
//! shared result alive until the last waiter has read it.

use std::collections::hash_map::Entry;
use std::hash::Hasher;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::sync::oneshot;
use twox_hash::XxHash64;

use super::node::SingleFetch;
use super::BufPair;
use super::Context;
use super::Resolver;
use crate::error::ResolveError;

/// Outcome of a completed load, broadcast to every waiter of the key.
#[derive(Debug, Clone)]
pub(crate) struct SharedLoad {
    data: Bytes,
    errors: Bytes,
    error: Option<ResolveError>,
}

fn fetch_key(fetch: &SingleFetch, input: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(fetch.data_source.unique_identifier());
    hasher.write(input);
    hasher.finish()
}

impl Resolver {
    pub(crate) async fn resolve_single_fetch(
        &self,
        ctx: &Context,
        fetch: &SingleFetch,
        input: &[u8],
        buf: &mut BufPair,
    ) -> Result<(), ResolveError> {
        if !self.enable_single_flight_loader || fetch.disallow_single_flight {
            return self.load_from_source(ctx, fetch, input, buf).await;
        }

        let key = fetch_key(fetch, input);
        loop {
            let mut inflight = self.inflight_fetches.lock().await;
            match inflight.entry(key) {
                Entry::Occupied(entry) => {
                    // register interest before releasing the lock
                    let mut receiver = entry.get().subscribe();
                    drop(inflight);
                    tracing::trace!(key, "joining in-flight fetch");

                    match receiver.recv().await {
                        Ok(shared) => {
                            if !shared.data.is_empty() {
                                buf.data.extend_from_slice(&shared.data);
                            }
                            if !shared.errors.is_empty() {
                                buf.errors.extend_from_slice(&shared.errors);
                            }
                            return match shared.error {
                                Some(err) => Err(err),
                                None => Ok(()),
                            };
                        }
                        // the leader went away without publishing, retry
                        Err(_) => continue,
                    }
                }
                Entry::Vacant(entry) => {
                    let (sender, _receiver) = broadcast::channel(1);
                    entry.insert(sender.clone());
                    drop(inflight);

                    let mut shared_buf = self.get_buf_pair();
                    let result = {
                        // when _drop_signal is dropped, by this block ending
                        // or by cancellation of this future, the sentinel
                        // task clears the key so waiters can retry
                        let wait_map = Arc::clone(&self.inflight_fetches);
                        let (_drop_signal, drop_sentinel) = oneshot::channel::<()>();
                        tokio::spawn(async move {
                            let _ = drop_sentinel.await;
                            wait_map.lock().await.remove(&key);
                        });

                        self.load_from_source(ctx, fetch, input, &mut shared_buf).await
                    };

                    if shared_buf.has_data() {
                        buf.data.extend_from_slice(&shared_buf.data);
                    }
                    if shared_buf.has_errors() {
                        buf.errors.extend_from_slice(&shared_buf.errors);
                    }

                    // waiters may already be gone, ignore send failures
                    let _ = sender.send(SharedLoad {
                        data: Bytes::copy_from_slice(&shared_buf.data),
                        errors: Bytes::copy_from_slice(&shared_buf.errors),
                        error: result.as_ref().err().cloned(),
                    });

                    self.free_buf_pair(shared_buf);
                    return result;
                }
            }
        }
    }

    pub(crate) async fn load_from_source(
        &self,
        ctx: &Context,
        fetch: &SingleFetch,
        input: &[u8],
        buf: &mut BufPair,
    ) -> Result<(), ResolveError> {
        tokio::select! {
            result = fetch.data_source.load(ctx, input, buf) => result.map_err(ResolveError::from),
            _ = ctx.cancellation.cancelled() => Err(ResolveError::Canceled),
        }
    }
}
