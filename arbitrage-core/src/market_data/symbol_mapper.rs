//! Symbol mapping between venue spellings and canonical symbols

use std::collections::HashMap;

use crate::exchanges::Symbol;

/// How a venue spells a canonical symbol
#[derive(Debug, Clone, Copy)]
pub enum SymbolFormat {
    /// Same spelling as the canonical symbol (`BTCUSDT`)
    Concatenated,
    /// Base, quote and optional suffix joined by a separator
    /// (`BTC-USDT-SWAP`, `BTC_USDT`, `BTC-USD-PERP`)
    Delimited {
        separator: &'static str,
        /// Replaces the canonical quote asset when the venue settles in another one
        quote: Option<&'static str>,
        suffix: Option<&'static str>,
    },
    /// Base asset only (`BTC`); the venue's quote is implied
    BaseOnly,
    /// Fixed `(canonical, venue)` pairs
    Explicit(&'static [(&'static str, &'static str)]),
}

impl SymbolFormat {
    pub fn venue_symbol(&self, symbol: &Symbol) -> Option<String> {
        match self {
            SymbolFormat::Concatenated => Some(symbol.as_str().to_string()),
            SymbolFormat::Delimited {
                separator,
                quote,
                suffix,
            } => {
                let (base, canonical_quote) = symbol.split_quote()?;
                let mut parts = vec![base, quote.unwrap_or(canonical_quote)];
                if let Some(suffix) = suffix {
                    parts.push(suffix);
                }
                Some(parts.join(separator))
            }
            SymbolFormat::BaseOnly => symbol.split_quote().map(|(base, _)| base.to_string()),
            SymbolFormat::Explicit(table) => table
                .iter()
                .find(|(canonical, _)| *canonical == symbol.as_str())
                .map(|(_, venue)| venue.to_string()),
        }
    }
}

/// Bidirectional lookup table for one venue, built over the configured symbols
#[derive(Debug, Clone, Default)]
pub struct SymbolMapper {
    to_venue: HashMap<Symbol, String>,
    to_canonical: HashMap<String, Symbol>,
    ordered: Vec<(Symbol, String)>,
}

impl SymbolMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every symbol the format can spell; the rest are left out
    pub fn build(symbols: &[Symbol], format: SymbolFormat) -> Self {
        let mut mapper = Self::new();
        for symbol in symbols {
            if let Some(venue) = format.venue_symbol(symbol) {
                mapper.add_mapping(symbol.clone(), venue);
            }
        }
        mapper
    }

    pub fn add_mapping(&mut self, canonical: Symbol, venue: impl Into<String>) {
        let venue = venue.into();
        if self.to_venue.contains_key(&canonical) {
            return;
        }
        self.to_venue.insert(canonical.clone(), venue.clone());
        self.to_canonical.insert(venue.clone(), canonical.clone());
        self.ordered.push((canonical, venue));
    }

    pub fn to_venue(&self, symbol: &Symbol) -> Option<&str> {
        self.to_venue.get(symbol).map(String::as_str)
    }

    pub fn to_canonical(&self, venue_symbol: &str) -> Option<&Symbol> {
        self.to_canonical.get(venue_symbol)
    }

    /// Venue spellings in configuration order
    pub fn venue_symbols(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(|(_, venue)| venue.as_str())
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
