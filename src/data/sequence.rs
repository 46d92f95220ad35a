//! Observation sequences of symbol indices

use crate::error::{HmmError, Result};
use std::ops::Deref;
use std::path::Path;

/// Ordered sequence of discrete observation symbols
///
/// Symbols are indices into the model's alphabet, not raw values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservationSequence {
    symbols: Vec<usize>,
}

impl ObservationSequence {
    /// Create new sequence from symbol indices
    pub fn new(symbols: Vec<usize>) -> Self {
        Self { symbols }
    }

    /// Parse an inline list such as `"0,1,1 0"` (commas and/or whitespace)
    pub fn parse(text: &str) -> Result<Self> {
        let symbols = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(parse_symbol)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { symbols })
    }

    /// Read symbols from a headerless CSV file, any number per line
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut symbols = Vec::new();
        for result in reader.records() {
            let record = result?;
            for field in record.iter().filter(|field| !field.is_empty()) {
                symbols.push(parse_symbol(field)?);
            }
        }

        Ok(Self { symbols })
    }

    /// Write one symbol per line
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;

        for symbol in &self.symbols {
            writer.write_record([symbol.to_string()])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Check every symbol against an alphabet of `n_symbols`
    pub fn validate(&self, n_symbols: usize) -> Result<()> {
        match self.symbols.iter().position(|&s| s >= n_symbols) {
            Some(t) => Err(HmmError::invalid(format!(
                "symbol {} at position {} is outside the alphabet of {} symbols",
                self.symbols[t], t, n_symbols
            ))),
            None => Ok(()),
        }
    }

    /// Smallest alphabet that contains every symbol
    pub fn alphabet_size(&self) -> usize {
        self.symbols.iter().max().map_or(0, |&max| max + 1)
    }

    /// Symbol indices
    pub fn as_slice(&self) -> &[usize] {
        &self.symbols
    }

    /// Consume into the underlying vector
    pub fn into_inner(self) -> Vec<usize> {
        self.symbols
    }
}

impl Deref for ObservationSequence {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.symbols
    }
}

impl From<Vec<usize>> for ObservationSequence {
    fn from(symbols: Vec<usize>) -> Self {
        Self::new(symbols)
    }
}

fn parse_symbol(token: &str) -> Result<usize> {
    token
        .trim()
        .parse()
        .map_err(|_| HmmError::invalid(format!("'{}' is not a symbol index", token)))
}
