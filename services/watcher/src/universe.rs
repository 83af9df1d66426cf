//! Instrument universe selection and diffing
//!
//! Pure functions over two snapshots: the instruments currently tracked and the latest
//! exchange list. One instrument is selected per base symbol, using the first configured
//! quote asset that is enabled for trading.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use types::Instrument;

/// Select one instrument per base by quote preference
pub fn select_universe(instruments: &[Instrument], quotes: &[String]) -> BTreeMap<String, Instrument> {
    let mut by_symbol: HashMap<(&str, &str), &Instrument> = HashMap::new();
    for instrument in instruments.iter().filter(|i| i.enable_trading) {
        by_symbol
            .entry((instrument.base.as_str(), instrument.quote.as_str()))
            .or_insert(instrument);
    }

    let mut selected = BTreeMap::new();
    for instrument in instruments.iter().filter(|i| i.enable_trading) {
        if selected.contains_key(&instrument.base) {
            continue;
        }
        let preferred = quotes
            .iter()
            .find_map(|quote| by_symbol.get(&(instrument.base.as_str(), quote.as_str())));
        if let Some(preferred) = preferred {
            selected.insert(instrument.base.clone(), (*preferred).clone());
        }
    }
    selected
}

/// Result of comparing the tracked set with a fresh instrument list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniverseDiff {
    /// Selected instruments whose base is not tracked yet
    pub added: Vec<Instrument>,
    /// Tracked bases whose instrument is gone or no longer tradable
    pub removed: Vec<String>,
    /// Tracked bases that stay
    pub unchanged: Vec<String>,
}

impl UniverseDiff {
    /// No subscription traffic needed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare the tracked instruments against the latest list
///
/// A tracked base is removed when its exact instrument disappears or stops trading, even if
/// another quote for the same base is still available. The base is picked up again with its
/// new quote on the next comparison, once the old pair is gone.
pub fn diff_universe<'a, I>(tracked: I, instruments: &[Instrument], quotes: &[String]) -> UniverseDiff
where
    I: IntoIterator<Item = &'a Instrument>,
{
    let tradable: HashMap<&str, &Instrument> = instruments
        .iter()
        .filter(|i| i.enable_trading)
        .map(|i| (i.symbol.as_str(), i))
        .collect();

    let mut diff = UniverseDiff::default();
    let mut tracked_bases = BTreeSet::new();
    for instrument in tracked {
        tracked_bases.insert(instrument.base.as_str());
        if tradable.contains_key(instrument.symbol.as_str()) {
            diff.unchanged.push(instrument.base.clone());
        } else {
            diff.removed.push(instrument.base.clone());
        }
    }

    diff.added = select_universe(instruments, quotes)
        .into_values()
        .filter(|instrument| !tracked_bases.contains(instrument.base.as_str()))
        .collect();
    diff.removed.sort();
    diff.unchanged.sort();
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(base: &str, quote: &str, enabled: bool) -> Instrument {
        Instrument {
            symbol: format!("{}-{}", base, quote),
            base: base.to_string(),
            quote: quote.to_string(),
            base_precision: 8,
            quote_precision: 4,
            enable_trading: enabled,
        }
    }

    fn quotes(list: &[&str]) -> Vec<String> {
        list.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn test_select_by_quote_preference() {
        let list = vec![
            instrument("ETH", "BTC", true),
            instrument("ETH", "USDT", true),
            instrument("XRP", "USDT", false),
            instrument("XRP", "BTC", true),
            instrument("DOGE", "EUR", true),
        ];
        let selected = select_universe(&list, &quotes(&["USDT", "BTC"]));

        assert_eq!(selected.len(), 2);
        assert_eq!(selected["ETH"].symbol, "ETH-USDT");
        assert_eq!(selected["XRP"].symbol, "XRP-BTC");
        assert!(!selected.contains_key("DOGE"));
    }

    #[test]
    fn test_first_run_adds_everything() {
        let list = vec![instrument("BTC", "USDT", true), instrument("ETH", "USDT", true)];
        let diff = diff_universe(std::iter::empty(), &list, &quotes(&["USDT"]));

        let added: Vec<&str> = diff.added.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(added, vec!["BTC-USDT", "ETH-USDT"]);
        assert!(diff.removed.is_empty());
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_unchanged_list_is_empty_diff() {
        let list = vec![instrument("BTC", "USDT", true), instrument("ETH", "USDT", true)];
        let tracked: Vec<Instrument> = select_universe(&list, &quotes(&["USDT"])).into_values().collect();

        let diff = diff_universe(&tracked, &list, &quotes(&["USDT"]));
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged, vec!["BTC", "ETH"]);
    }

    #[test]
    fn test_disabled_and_missing_are_removed() {
        let tracked = vec![
            instrument("BTC", "USDT", true),
            instrument("ETH", "USDT", true),
            instrument("XRP", "USDT", true),
        ];
        let list = vec![
            instrument("BTC", "USDT", true),
            instrument("ETH", "USDT", false),
            instrument("SOL", "USDT", true),
        ];
        let diff = diff_universe(&tracked, &list, &quotes(&["USDT"]));

        assert_eq!(diff.removed, vec!["ETH", "XRP"]);
        assert_eq!(diff.unchanged, vec!["BTC"]);
        assert_eq!(diff.added, vec![instrument("SOL", "USDT", true)]);
    }

    #[test]
    fn test_quote_switch_waits_for_removal() {
        let tracked = vec![instrument("ETH", "USDT", true)];
        let list = vec![instrument("ETH", "USDT", false), instrument("ETH", "BTC", true)];
        let diff = diff_universe(&tracked, &list, &quotes(&["USDT", "BTC"]));

        assert_eq!(diff.removed, vec!["ETH"]);
        assert!(diff.added.is_empty());

        let diff = diff_universe(std::iter::empty(), &list, &quotes(&["USDT", "BTC"]));
        assert_eq!(diff.added, vec![instrument("ETH", "BTC", true)]);
    }
}
