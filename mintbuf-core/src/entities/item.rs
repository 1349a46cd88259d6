use bytes::Bytes;
use mintbuf_sdk::objects::NftId;
use mintbuf_sdk::transaction::TxSignature;
use thiserror::Error;

/// Maximum `name` length accepted by the token metadata program, in bytes.
pub const MAX_NAME_LEN: usize = 32;
/// Maximum `symbol` (category) length, in bytes.
pub const MAX_SYMBOL_LEN: usize = 10;
/// Maximum metadata URI length, in bytes.
pub const MAX_URI_LEN: usize = 200;
/// Upper bound for `seller_fee_basis_points`.
pub const MAX_BASIS_POINTS: u16 = 10_000;

/// Where a candidate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOrigin {
    /// Reserved in the approval pool; must be acknowledged once registered.
    Pool { id: NftId },
    /// Generated from feed content, identified by the content's SHA-256 (hex).
    Generated { content_id: String },
}

/// A binary asset waiting to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAsset {
    pub bytes: Bytes,
    pub mime: String,
}

/// An item produced by an [`ItemSource`](crate::sources::ItemSource),
/// enriched as it moves through the pipeline.
///
/// Owned by exactly one run; never shared between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub origin: ItemOrigin,
    /// The source content the item was built from (headline, pool id, ...).
    pub raw_content: String,
    pub display_asset: Option<DisplayAsset>,
    /// `None` until the item is published.
    pub metadata_uri: Option<String>,
    pub name: String,
    pub category: String,
    pub price_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidItem {
    #[error("name is {0} bytes, limit is {MAX_NAME_LEN}")]
    NameTooLong(usize),
    #[error("name is empty")]
    EmptyName,
    #[error("category is {0} bytes, limit is {MAX_SYMBOL_LEN}")]
    CategoryTooLong(usize),
    #[error("metadata URI is {0} bytes, limit is {MAX_URI_LEN}")]
    UriTooLong(usize),
    #[error("price {0} bps exceeds {MAX_BASIS_POINTS}")]
    PriceOutOfRange(u16),
}

impl CandidateItem {
    /// Whether the publish stage has to run for this item.
    pub fn needs_publication(&self) -> bool {
        self.metadata_uri.is_none()
    }

    /// Pool items are reserved upstream and must be acknowledged.
    pub fn requires_acknowledgement(&self) -> bool {
        matches!(self.origin, ItemOrigin::Pool { .. })
    }

    /// Check the fields the on-chain instruction will carry. The URI is only
    /// checked once present.
    pub fn validate(&self) -> Result<(), InvalidItem> {
        if self.name.is_empty() {
            return Err(InvalidItem::EmptyName);
        }
        if self.name.len() > MAX_NAME_LEN {
            return Err(InvalidItem::NameTooLong(self.name.len()));
        }
        if self.category.len() > MAX_SYMBOL_LEN {
            return Err(InvalidItem::CategoryTooLong(self.category.len()));
        }
        if let Some(uri) = &self.metadata_uri
            && uri.len() > MAX_URI_LEN
        {
            return Err(InvalidItem::UriTooLong(uri.len()));
        }
        if self.price_bps > MAX_BASIS_POINTS {
            return Err(InvalidItem::PriceOutOfRange(self.price_bps));
        }
        Ok(())
    }
}

/// Terminal record of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredItem {
    pub metadata_uri: String,
    pub name: String,
    pub category: String,
    pub price_bps: u16,
    pub signature: TxSignature,
}

/// Truncate `s` to at most `max` bytes without splitting a character.
pub fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> CandidateItem {
        CandidateItem {
            origin: ItemOrigin::Pool {
                id: NftId("42".into()),
            },
            raw_content: "42".into(),
            display_asset: None,
            metadata_uri: Some("ipfs://bafy".into()),
            name: "Headline".into(),
            category: "NEWS".into(),
            price_bps: 500,
        }
    }

    #[test]
    fn test_valid_item() {
        assert_eq!(item().validate(), Ok(()));
        assert!(item().requires_acknowledgement());
        assert!(!item().needs_publication());
    }

    #[test]
    fn test_limits() {
        let mut long_name = item();
        long_name.name = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            long_name.validate(),
            Err(InvalidItem::NameTooLong(MAX_NAME_LEN + 1))
        );

        let mut long_symbol = item();
        long_symbol.category = "HEADLINES!!".into();
        assert!(matches!(
            long_symbol.validate(),
            Err(InvalidItem::CategoryTooLong(11))
        ));

        let mut long_uri = item();
        long_uri.metadata_uri = Some(format!("ipfs://{}", "a".repeat(MAX_URI_LEN)));
        assert!(matches!(long_uri.validate(), Err(InvalidItem::UriTooLong(_))));

        let mut pricey = item();
        pricey.price_bps = 10_001;
        assert_eq!(pricey.validate(), Err(InvalidItem::PriceOutOfRange(10_001)));
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_on_char_boundary("short", 32), "short");
        assert_eq!(truncate_on_char_boundary("abcdef", 3), "abc");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate_on_char_boundary("aé", 2), "a");
    }
}
