use std::collections::BTreeMap;

use docattr_doc::{extract_touched_ranges, AttributeMap, AttributionItem};
use docattr_store::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Who made an update, when, and any extra tags to attach.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAttribution {
    pub user: String,
    pub timestamp: Timestamp,
    /// Tag names without the `_` prefix.
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

impl UpdateAttribution {
    pub fn new(user: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            user: user.into(),
            timestamp,
            custom: BTreeMap::new(),
        }
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// Build the attribute map for one encoded update.
///
/// Inserted ranges get `insert`/`insertAt`, deleted ranges get
/// `delete`/`deleteAt`, and every touched range gets the custom tags.
pub fn attribute_update(update: &[u8], attribution: &UpdateAttribution) -> CoreResult<AttributeMap> {
    let touched = extract_touched_ranges(update)?;
    let mut map = AttributeMap::from_id_set(
        &touched.inserted,
        &[
            AttributionItem::insert(attribution.user.as_str()),
            AttributionItem::insert_at(attribution.timestamp),
        ],
    );
    map.merge(&AttributeMap::from_id_set(
        &touched.deleted,
        &[
            AttributionItem::delete(attribution.user.as_str()),
            AttributionItem::delete_at(attribution.timestamp),
        ],
    ));
    if !attribution.custom.is_empty() {
        let tags: Vec<AttributionItem> = attribution
            .custom
            .iter()
            .map(|(key, value)| AttributionItem::custom(key, value.as_str()))
            .collect();
        map.merge(&AttributeMap::from_id_set(&touched.all(), &tags));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docattr_doc::{Document, Identifier};

    fn names(map: &AttributeMap, id: Identifier) -> Vec<(String, String)> {
        map.attributions(&id)
            .unwrap_or_default()
            .iter()
            .map(|item| (item.name.clone(), item.value.clone()))
            .collect()
    }

    #[test]
    fn insert_is_attributed() {
        let mut doc = Document::new(1);
        let update = doc.insert(0, "hi").unwrap().encode().unwrap();
        let map = attribute_update(&update, &UpdateAttribution::new("alice", 1000)).unwrap();
        assert_eq!(
            names(&map, Identifier::new(1, 1)),
            vec![
                ("insert".to_string(), "alice".to_string()),
                ("insertAt".to_string(), "1000".to_string()),
            ]
        );
        assert!(map.attributions(&Identifier::new(1, 2)).is_none());
    }

    #[test]
    fn delete_is_attributed() {
        let mut doc = Document::new(1);
        doc.insert(0, "abc").unwrap();
        let update = doc.delete(1, 1).unwrap().encode().unwrap();
        let map = attribute_update(&update, &UpdateAttribution::new("bob", 7)).unwrap();
        assert_eq!(
            names(&map, Identifier::new(1, 1)),
            vec![
                ("delete".to_string(), "bob".to_string()),
                ("deleteAt".to_string(), "7".to_string()),
            ]
        );
        assert!(map.attributions(&Identifier::new(1, 0)).is_none());
    }

    #[test]
    fn custom_tags_cover_every_touched_range() {
        let mut doc = Document::new(1);
        doc.insert(0, "abc").unwrap();
        let mut update = doc.insert(3, "d").unwrap();
        update.deletes = doc.delete(0, 1).unwrap().deletes;
        let attribution = UpdateAttribution::new("carol", 5).with_custom("session", "s1");
        let map = attribute_update(&update.encode().unwrap(), &attribution).unwrap();

        let session = ("_session".to_string(), "s1".to_string());
        assert!(names(&map, Identifier::new(1, 0)).contains(&session));
        assert!(names(&map, Identifier::new(1, 3)).contains(&session));
        assert!(map.attributions(&Identifier::new(1, 1)).is_none());
    }

    #[test]
    fn malformed_update_is_rejected() {
        let err = attribute_update(b"garbage", &UpdateAttribution::new("x", 0)).unwrap_err();
        assert!(err.is_decode());
    }
}
