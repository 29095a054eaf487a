//! Ordered list normalizer
//!
//! Turns the host's id → token map into the render order: soft-deleted tokens
//! are dropped and the rest are sorted by `(order, id)`. Ties on `order` are
//! broken by id so the result never depends on map iteration order.

use tracing::warn;

use crate::token::{ColorToken, OrderedItemMap, TokenId};

/// A token together with its id, in render position
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub id: TokenId,
    pub token: ColorToken,
}

/// Non-deleted tokens in render order
///
/// `ids[i] == items[i].id` for every `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedOrder {
    ids: Vec<TokenId>,
    items: Vec<NormalizedItem>,
}

impl NormalizedOrder {
    pub fn from_map(map: &OrderedItemMap) -> Self {
        let mut items: Vec<NormalizedItem> = map
            .iter()
            .filter(|(_, token)| !token.deleted)
            .map(|(id, token)| NormalizedItem {
                id: id.clone(),
                token: token.clone(),
            })
            .collect();
        items.sort_by(|a, b| a.token.order.cmp(&b.token.order).then_with(|| a.id.cmp(&b.id)));

        let ids = items.iter().map(|item| item.id.clone()).collect();
        let order = Self { ids, items };

        let misplaced = order.misplaced();
        if !misplaced.is_empty() {
            warn!(count = misplaced.len(), items = ?misplaced, "items out of order");
        }
        order
    }

    pub fn ids(&self) -> &[TokenId] {
        &self.ids
    }

    pub fn items(&self) -> &[NormalizedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids whose stored `order` does not point back at themselves
    ///
    /// Non-empty when `order` values are duplicated, have gaps or run past the
    /// end of the list. Purely informational.
    pub fn misplaced(&self) -> Vec<TokenId> {
        self.items
            .iter()
            .filter(|item| self.ids.get(item.token.order as usize) != Some(&item.id))
            .map(|item| item.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, u32, bool)]) -> OrderedItemMap {
        entries
            .iter()
            .map(|(id, order, deleted)| {
                let mut token = ColorToken::new(*order, "rgba(0,0,0,1)");
                token.deleted = *deleted;
                (TokenId::from(*id), token)
            })
            .collect()
    }

    fn ids(order: &NormalizedOrder) -> Vec<&str> {
        order.ids().iter().map(TokenId::as_str).collect()
    }

    #[test]
    fn test_sorted_by_order_not_by_key() {
        let order = NormalizedOrder::from_map(&map(&[("a", 2, false), ("b", 0, false), ("c", 1, false)]));
        assert_eq!(ids(&order), vec!["b", "c", "a"]);
        for (id, item) in order.ids().iter().zip(order.items()) {
            assert_eq!(id, &item.id);
        }
        assert!(order.misplaced().is_empty());
    }

    #[test]
    fn test_deleted_tokens_excluded() {
        let order = NormalizedOrder::from_map(&map(&[("a", 0, true), ("b", 1, false), ("c", 0, false)]));
        assert_eq!(ids(&order), vec!["c", "b"]);
        assert_eq!(order.len(), 2);
        assert!(order.items().iter().all(|item| item.id.as_str() != "a"));
    }

    #[test]
    fn test_duplicate_order_breaks_ties_by_id() {
        let order = NormalizedOrder::from_map(&map(&[("z", 0, false), ("m", 0, false), ("a", 1, false)]));
        assert_eq!(ids(&order), vec!["m", "z", "a"]);
        // z claims slot 0 but sits at 1, a claims 1 but sits at 2
        assert_eq!(order.misplaced(), vec![TokenId::from("z"), TokenId::from("a")]);
    }

    #[test]
    fn test_gaps_are_reported_but_kept() {
        let order = NormalizedOrder::from_map(&map(&[("a", 5, false), ("b", 10, false)]));
        assert_eq!(ids(&order), vec!["a", "b"]);
        assert_eq!(order.misplaced().len(), 2);
    }

    #[test]
    fn test_all_deleted_yields_empty_order() {
        let order = NormalizedOrder::from_map(&map(&[("a", 0, true)]));
        assert!(order.is_empty());
    }
}
