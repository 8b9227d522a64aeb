//! Pairwise relative spreads across a symbol's sources

use serde::Serialize;
use std::collections::HashMap;

use super::percentage_change;
use crate::exchanges::{Source, Symbol};

/// `spreads[a][b] = (price[b] - price[a]) / price[a] * 100`.
///
/// Each row is based on its own source's price, so the matrix is not
/// antisymmetric: `spreads[a][b] != -spreads[b][a]` in general.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadMatrix {
    pub symbol: Symbol,
    pub spreads: HashMap<Source, HashMap<Source, f64>>,
    pub prices: HashMap<Source, f64>,
}

impl SpreadMatrix {
    pub fn build(symbol: &Symbol, prices: &HashMap<Source, f64>) -> Self {
        let spreads = prices
            .iter()
            .map(|(from, from_price)| {
                let row = prices
                    .iter()
                    .filter(|(to, _)| *to != from)
                    .map(|(to, to_price)| (*to, percentage_change(*from_price, *to_price)))
                    .collect();
                (*from, row)
            })
            .collect();

        Self {
            symbol: symbol.clone(),
            spreads,
            prices: prices.clone(),
        }
    }

    pub fn spread(&self, from: Source, to: Source) -> Option<f64> {
        self.spreads.get(&from)?.get(&to).copied()
    }
}
