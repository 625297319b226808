// SPDX-License-Identifier: GPL-3.0-only
//! Field-level comparison between a stored listing and a freshly mapped one.

use std::collections::BTreeMap;

use crate::store::{FieldValue, ListingRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Value the patch was computed against
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Minimal set of changed columns for one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPatch {
    pub external_id: i64,
    pub changes: BTreeMap<&'static str, FieldChange>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.changes.keys().copied()
    }
}

/// Compare every mapped column.
pub fn diff_listings(stored: &ListingRecord, candidate: &ListingRecord) -> ListingPatch {
    diff_fields(stored, candidate, None)
}

/// Compare only the named columns, e.g. `&["image_urls"]`.
pub fn diff_selected(
    stored: &ListingRecord,
    candidate: &ListingRecord,
    columns: &[&str],
) -> ListingPatch {
    diff_fields(stored, candidate, Some(columns))
}

fn diff_fields(
    stored: &ListingRecord,
    candidate: &ListingRecord,
    only: Option<&[&str]>,
) -> ListingPatch {
    let changes = stored
        .fields()
        .into_iter()
        .zip(candidate.fields())
        .filter(|((name, _), _)| only.is_none_or(|columns| columns.contains(name)))
        .filter(|((_, old), (_, new))| old != new)
        .map(|((name, old), (_, new))| (name, FieldChange { old, new }))
        .collect();

    ListingPatch {
        external_id: candidate.external_id,
        changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn stored_listing() -> ListingRecord {
        let mut record = ListingRecord::new(1001);
        record.price = Some(10000);
        record.brand = Some("Volvo".to_string());
        record.wltp_co2_emission_combined_min = Some(168.0);
        record.image_urls = vec![json!("https://img/1.jpg"), json!("https://img/2.jpg")];
        record
    }

    #[test]
    fn test_price_change_is_the_only_change() {
        let stored = stored_listing();
        let mut candidate = stored.clone();
        candidate.price = Some(9500);

        let patch = diff_listings(&stored, &candidate);

        assert_eq!(patch.external_id, 1001);
        assert_eq!(patch.len(), 1);
        assert_eq!(
            patch.changes.get("price"),
            Some(&FieldChange {
                old: FieldValue::Int(Some(10000)),
                new: FieldValue::Int(Some(9500)),
            })
        );
    }

    #[test]
    fn test_identical_records_give_empty_patch() {
        let stored = stored_listing();
        let patch = diff_listings(&stored, &stored.clone());
        assert!(patch.is_empty());
    }

    #[test]
    fn test_audit_link_is_not_compared() {
        let stored = stored_listing();
        let mut candidate = stored.clone();
        candidate.api_log_id = Some(Uuid::new_v4());

        assert!(diff_listings(&stored, &candidate).is_empty());
    }

    #[test]
    fn test_list_element_change_is_whole_field_change() {
        let stored = stored_listing();
        let mut candidate = stored.clone();
        candidate.image_urls[1] = json!("https://img/2b.jpg");

        let patch = diff_listings(&stored, &candidate);
        assert_eq!(patch.columns().collect::<Vec<_>>(), vec!["image_urls"]);
        assert_eq!(
            patch.changes["image_urls"].new,
            FieldValue::Json(json!(["https://img/1.jpg", "https://img/2b.jpg"]))
        );
    }

    #[test]
    fn test_list_reorder_counts_as_change() {
        let stored = stored_listing();
        let mut candidate = stored.clone();
        candidate.image_urls.reverse();

        assert_eq!(diff_listings(&stored, &candidate).len(), 1);
    }

    #[test]
    fn test_null_transitions() {
        let stored = stored_listing();
        let mut candidate = stored.clone();
        candidate.price = None;
        candidate.dates_removed = Some("2024-06-01T00:00:00.000Z".to_string());

        let patch = diff_listings(&stored, &candidate);
        let mut columns: Vec<_> = patch.columns().collect();
        columns.sort();
        assert_eq!(columns, vec!["dates_removed", "price"]);
        assert_eq!(patch.changes["price"].new, FieldValue::Int(None));
    }

    #[test]
    fn test_diff_selected_ignores_other_columns() {
        let stored = stored_listing();
        let mut candidate = stored.clone();
        candidate.price = Some(1);
        candidate.image_urls = vec![json!("https://img/new.jpg")];

        let patch = diff_selected(&stored, &candidate, &["image_urls"]);
        assert_eq!(patch.columns().collect::<Vec<_>>(), vec!["image_urls"]);

        let patch = diff_selected(&stored, &candidate, &["brand"]);
        assert!(patch.is_empty());
    }
}
