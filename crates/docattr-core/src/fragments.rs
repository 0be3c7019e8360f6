//! Loading the persisted attribution objects of one document.

use docattr_doc::AttributeMap;
use docattr_store::{BlobStore, DocId, KeyScheme, ObjectClass, Timestamp};
use tracing::debug;

use crate::error::CoreResult;

/// Decoded attribution objects, in key order.
#[derive(Debug, Default)]
pub(crate) struct Persisted {
    pub maps: Vec<AttributeMap>,
    /// Every listed key, including ones that vanished before they were read.
    pub keys: Vec<String>,
    /// Listed keys whose object was gone by the time it was fetched.
    pub vanished: usize,
}

impl Persisted {
    /// Largest timestamp among the listed keys.
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.keys
            .iter()
            .filter_map(|key| KeyScheme::parse_timestamp(key).ok())
            .max()
    }
}

pub(crate) async fn load(
    store: &dyn BlobStore,
    scheme: &KeyScheme,
    docid: &DocId,
) -> CoreResult<Persisted> {
    let keys = store
        .list_prefix(&scheme.prefix(ObjectClass::Attribution, docid))
        .await?;
    let mut persisted = Persisted {
        maps: Vec::with_capacity(keys.len()),
        keys: Vec::new(),
        vanished: 0,
    };
    for key in &keys {
        match store.get(key).await? {
            Some(bytes) => persisted.maps.push(AttributeMap::decode(&bytes)?),
            None => {
                debug!(%docid, %key, "attribution object vanished after listing");
                persisted.vanished += 1;
            }
        }
    }
    persisted.keys = keys;
    Ok(persisted)
}
