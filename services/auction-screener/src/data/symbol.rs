//! Security identifiers.
//!
//! Tushare tickers look like `000001.SZ`; downstream tooling (GM / EmQuant)
//! expects the exchange-qualified form `SZSE.000001`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange a security is listed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// Shenzhen Stock Exchange
    Szse,
    /// Shanghai Stock Exchange
    Shse,
    /// Any other suffix, kept verbatim (upper-cased)
    Other(String),
}

impl Exchange {
    /// Map a vendor suffix (`SZ`, `SH`, ...) to an exchange.
    pub fn from_suffix(suffix: &str) -> Self {
        match suffix.to_uppercase().as_str() {
            "SZ" => Self::Szse,
            "SH" => Self::Shse,
            other => Self::Other(other.to_string()),
        }
    }

    /// Prefix used in the exchange-qualified form.
    pub fn prefix(&self) -> &str {
        match self {
            Self::Szse => "SZSE",
            Self::Shse => "SHSE",
            Self::Other(s) => s,
        }
    }
}

/// An exchange-qualified security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityId {
    vendor: String,
    exchange: Option<Exchange>,
    code: String,
}

impl SecurityId {
    /// Normalize a vendor ticker. Anything not shaped `code.SUFFIX` is kept as is.
    pub fn from_vendor(ticker: &str) -> Self {
        let ticker = ticker.trim();
        let parts: Vec<&str> = ticker.split('.').collect();

        match parts.as_slice() {
            [code, suffix] if !code.is_empty() && !suffix.is_empty() => Self {
                vendor: ticker.to_string(),
                exchange: Some(Exchange::from_suffix(suffix)),
                code: (*code).to_string(),
            },
            _ => Self {
                vendor: ticker.to_string(),
                exchange: None,
                code: ticker.to_string(),
            },
        }
    }

    /// The ticker as the vendor spells it (used for vendor queries).
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Local exchange code (e.g., `000001`).
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn exchange(&self) -> Option<&Exchange> {
        self.exchange.as_ref()
    }

    /// Exchange-qualified form, e.g. `SZSE.000001`.
    pub fn qualified(&self) -> String {
        match &self.exchange {
            Some(exchange) => format!("{}.{}", exchange.prefix(), self.code),
            None => self.vendor.clone(),
        }
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_exchanges() {
        assert_eq!(SecurityId::from_vendor("000001.SZ").qualified(), "SZSE.000001");
        assert_eq!(SecurityId::from_vendor("600000.SH").qualified(), "SHSE.600000");
        assert_eq!(SecurityId::from_vendor("600000.sh").qualified(), "SHSE.600000");
    }

    #[test]
    fn test_unknown_suffix_passes_through() {
        let id = SecurityId::from_vendor("430047.BJ");
        assert_eq!(id.qualified(), "BJ.430047");
        assert_eq!(id.exchange(), Some(&Exchange::Other("BJ".into())));
    }

    #[test]
    fn test_malformed_ticker_unchanged() {
        assert_eq!(SecurityId::from_vendor("000001").qualified(), "000001");
        assert_eq!(SecurityId::from_vendor("a.b.c").qualified(), "a.b.c");
        assert_eq!(SecurityId::from_vendor(".SZ").qualified(), ".SZ");
        assert!(SecurityId::from_vendor("000001").exchange().is_none());
    }

    #[test]
    fn test_vendor_and_code() {
        let id = SecurityId::from_vendor(" 300750.SZ ");
        assert_eq!(id.vendor(), "300750.SZ");
        assert_eq!(id.code(), "300750");
        assert_eq!(id.to_string(), "SZSE.300750");
    }
}
