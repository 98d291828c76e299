//! Auction snapshot normalization.
//!
//! Vendor rows arrive with field names that vary across endpoints and API
//! versions. The normalizer resolves each logical field through an ordered
//! alias table and coerces values into a canonical [`AuctionSnapshot`].

use serde::{Deserialize, Serialize};

use crate::data::{coerce_f64, RawRecord, SecurityId};

use super::config::FieldAliases;

/// Canonical opening-auction record for one security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionSnapshot {
    pub id: SecurityId,
    pub pre_close: f64,
    pub match_price: f64,
    /// Shares matched in the auction (0.0 when the vendor value is unusable)
    pub match_volume: f64,
    /// Lowest auction price; `None` when missing or zero
    pub low_price: Option<f64>,
}

impl AuctionSnapshot {
    /// Vendor ticker, the join key against baselines.
    pub fn ts_code(&self) -> &str {
        self.id.vendor()
    }

    /// Gap over previous close, `None` unless `pre_close > 0`.
    pub fn gap(&self) -> Option<f64> {
        (self.pre_close > 0.0).then(|| self.match_price / self.pre_close - 1.0)
    }
}

/// Resolves raw vendor rows into [`AuctionSnapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct SnapshotNormalizer {
    aliases: FieldAliases,
}

impl SnapshotNormalizer {
    pub fn new(aliases: FieldAliases) -> Self {
        Self { aliases }
    }

    /// Normalize one row. Returns `None` when the identifier, previous close
    /// or match price cannot be resolved.
    pub fn normalize(&self, record: &RawRecord) -> Option<AuctionSnapshot> {
        let ticker = lookup(record, &self.aliases.identifier).and_then(identifier_text)?;
        let pre_close = lookup(record, &self.aliases.pre_close).and_then(coerce_f64)?;
        let match_price = lookup(record, &self.aliases.match_price).and_then(coerce_f64)?;

        let match_volume = lookup(record, &self.aliases.match_volume)
            .and_then(coerce_f64)
            .unwrap_or(0.0);

        // A zero, null or non-numeric low falls through to the next alias
        let low_price = lookup_each(record, &self.aliases.low_price)
            .filter_map(coerce_f64)
            .find(|low| *low != 0.0);

        Some(AuctionSnapshot {
            id: SecurityId::from_vendor(&ticker),
            pre_close,
            match_price,
            match_volume,
            low_price,
        })
    }

    /// Normalize a batch, returning the snapshots and the number of rows dropped.
    pub fn normalize_all(&self, records: &[RawRecord]) -> (Vec<AuctionSnapshot>, usize) {
        let snapshots: Vec<AuctionSnapshot> =
            records.iter().filter_map(|r| self.normalize(r)).collect();
        let dropped = records.len() - snapshots.len();
        (snapshots, dropped)
    }
}

/// First alias present in the record wins.
fn lookup<'a>(record: &'a RawRecord, aliases: &'a [String]) -> Option<&'a serde_json::Value> {
    lookup_each(record, aliases).next()
}

/// Values of every alias present in the record, in alias order. An exact key
/// match is tried before a case-insensitive scan.
fn lookup_each<'a>(
    record: &'a RawRecord,
    aliases: &'a [String],
) -> impl Iterator<Item = &'a serde_json::Value> + 'a {
    aliases.iter().filter_map(move |alias| {
        record.get(alias.as_str()).or_else(|| {
            record
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(alias))
                .map(|(_, value)| value)
        })
    })
}

fn identifier_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> RawRecord {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn test_normalize_primary_names() {
        let normalizer = SnapshotNormalizer::default();
        let snap = normalizer
            .normalize(&row(json!({
                "ts_code": "000001.SZ",
                "pre_close": 10.0,
                "match_price": 10.8,
                "match_vol": 50000,
                "low_price": 10.6
            })))
            .unwrap();

        assert_eq!(snap.ts_code(), "000001.SZ");
        assert_eq!(snap.id.qualified(), "SZSE.000001");
        assert_eq!(snap.match_volume, 50000.0);
        assert_eq!(snap.low_price, Some(10.6));
        assert!((snap.gap().unwrap() - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_alias_priority_and_case() {
        let normalizer = SnapshotNormalizer::default();
        let snap = normalizer
            .normalize(&row(json!({
                "CODE": "600000.SH",
                "LAST_CLOSE": "8.00",
                "pre_close_px": "9.00",
                "price": 9.5,
                "match_px": 9.2,
                "Match_Qty": "1200"
            })))
            .unwrap();

        // pre_close_px outranks last_close; match_px outranks price
        assert_eq!(snap.pre_close, 9.0);
        assert_eq!(snap.match_price, 9.2);
        assert_eq!(snap.match_volume, 1200.0);
        assert_eq!(snap.ts_code(), "600000.SH");
        assert_eq!(snap.low_price, None);
    }

    #[test]
    fn test_stk_auction_schema() {
        let normalizer = SnapshotNormalizer::default();
        let snap = normalizer
            .normalize(&row(json!({
                "ts_code": "300750.SZ",
                "trade_date": "20250103",
                "vol": 12345,
                "price": 200.5,
                "pre_close": 190.0
            })))
            .unwrap();
        assert_eq!(snap.match_volume, 12345.0);
        assert_eq!(snap.match_price, 200.5);
    }

    #[test]
    fn test_missing_required_fields_dropped() {
        let normalizer = SnapshotNormalizer::default();
        assert!(normalizer
            .normalize(&row(json!({ "pre_close": 10.0, "match_price": 10.5 })))
            .is_none());
        assert!(normalizer
            .normalize(&row(json!({ "ts_code": "000001.SZ", "match_price": 10.5 })))
            .is_none());
        assert!(normalizer
            .normalize(&row(
                json!({ "ts_code": "000001.SZ", "pre_close": "n/a", "match_price": 10.5 })
            ))
            .is_none());
        assert!(normalizer
            .normalize(&row(json!({ "ts_code": "", "pre_close": 10.0, "match_price": 10.5 })))
            .is_none());
    }

    #[test]
    fn test_bad_volume_and_zero_low() {
        let normalizer = SnapshotNormalizer::default();
        let snap = normalizer
            .normalize(&row(json!({
                "ts_code": "000002.SZ",
                "pre_close": 10.0,
                "match_price": 10.1,
                "match_vol": "--",
                "low_price": 0
            })))
            .unwrap();
        assert_eq!(snap.match_volume, 0.0);
        assert_eq!(snap.low_price, None);
    }

    #[test]
    fn test_unusable_low_falls_through_to_next_alias() {
        let normalizer = SnapshotNormalizer::default();
        let base = json!({ "ts_code": "000001.SZ", "pre_close": 10.0, "price": 10.8 });

        for low_price in [json!(0), json!(null), json!("--")] {
            let mut record = row(base.clone());
            record.insert("low_price".into(), low_price.clone());
            record.insert("min_price".into(), json!(10.6));
            let snap = normalizer.normalize(&record).unwrap();
            assert_eq!(snap.low_price, Some(10.6), "low_price = {low_price}");
        }

        let mut record = row(base);
        record.insert("low_price".into(), json!(10.7));
        record.insert("min_price".into(), json!(10.6));
        assert_eq!(normalizer.normalize(&record).unwrap().low_price, Some(10.7));
    }

    #[test]
    fn test_custom_aliases() {
        let aliases = FieldAliases {
            pre_close: vec!["yclose".into()],
            ..FieldAliases::default()
        };
        let normalizer = SnapshotNormalizer::new(aliases);
        let snap = normalizer
            .normalize(&row(json!({ "ts_code": "000001.SZ", "yclose": 5.0, "price": 5.5 })))
            .unwrap();
        assert_eq!(snap.pre_close, 5.0);
    }

    #[test]
    fn test_normalize_all_counts_dropped() {
        let normalizer = SnapshotNormalizer::default();
        let rows = vec![
            row(json!({ "ts_code": "000001.SZ", "pre_close": 10.0, "price": 10.2 })),
            row(json!({ "ts_code": "000002.SZ" })),
            row(json!({ "foo": 1 })),
        ];
        let (snaps, dropped) = normalizer.normalize_all(&rows);
        assert_eq!(snaps.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_gap_requires_positive_pre_close() {
        let normalizer = SnapshotNormalizer::default();
        let snap = normalizer
            .normalize(&row(json!({ "ts_code": "000001.SZ", "pre_close": 0, "price": 10.2 })))
            .unwrap();
        assert_eq!(snap.gap(), None);
    }
}
