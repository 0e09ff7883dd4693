//! [`ObjectLister`] and [`DeleteSubmitter`] over an `object_store` backend.
//!
//! Deletes run on their own tokio task and report back on the completion
//! channel, request ids come from a per-backend counter.

use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;

use crate::error::StoreError;
use crate::store::{
    Completion, CompletionSender, DeleteSubmitter, ListedObject, ObjectLister, RequestId,
};

pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    next_request_id: AtomicU64,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            next_request_id: AtomicU64::new(1),
        }
    }
}

/// Decoded name of `location` relative to `prefix`, e.g. `2024/métrics.bin`.
///
/// Path parts are kept percent-encoded by `object_store`, the name is only
/// meant for display.
fn relative_name(prefix: &ObjectPath, location: &ObjectPath) -> String {
    let decode = |raw: &str| percent_decode_str(raw).decode_utf8_lossy().into_owned();
    match location.prefix_match(prefix) {
        Some(parts) => parts
            .map(|part| decode(part.as_ref()))
            .collect::<Vec<_>>()
            .join("/"),
        None => decode(location.as_ref()),
    }
}

impl ObjectLister for ObjectStoreBackend {
    fn list_objects(&self, path: &str) -> BoxStream<'_, Result<ListedObject, StoreError>> {
        // Same encoding the writers use, so `tsdb/métrics` finds `tsdb/m%C3%A9trics/..`
        let prefix = ObjectPath::from(path);

        tracing::debug!(path = %prefix, "Listing objects");

        let listing = self.store.list(Some(&prefix));
        listing
            .map(move |meta| -> Result<ListedObject, StoreError> {
                let location = meta?.location;
                Ok(ListedObject::new(
                    relative_name(&prefix, &location),
                    location.to_string(),
                ))
            })
            .boxed()
    }
}

impl DeleteSubmitter for ObjectStoreBackend {
    fn submit_delete(
        &self,
        key: &str,
        completions: &CompletionSender,
    ) -> Result<RequestId, StoreError> {
        // Keys come from `list_objects` in their encoded form
        let location = ObjectPath::parse(key)?;
        let runtime = Handle::try_current()?;
        if completions.is_closed() {
            return Err(StoreError::Rejected(
                "completion channel is closed".to_string(),
            ));
        }

        let id = RequestId::new(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        let store = Arc::clone(&self.store);
        let completions = completions.clone();

        runtime.spawn(async move {
            let completion = match store.delete(&location).await {
                Ok(()) => Completion::success(id),
                Err(e) => Completion::failure(id, e.into()),
            };
            if completions.send(completion).await.is_err() {
                tracing::debug!(
                    request_id = %id,
                    path = %location,
                    "Purge gave up before the delete finished"
                );
            }
        });

        Ok(id)
    }
}
