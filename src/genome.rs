//! Scaffold bookkeeping and region masking.

use crate::error::{BsaError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One qualifying scaffold with its genome-wide placement.
#[derive(Debug, Clone)]
pub struct Scaffold {
    pub name: String,
    pub length: u64,
    /// Cumulative length of all preceding qualifying scaffolds.
    pub offset: u64,
}

/// Qualifying scaffolds in VCF header order.
#[derive(Debug, Default)]
pub struct Genome {
    scaffolds: Vec<Scaffold>,
    by_name: HashMap<String, usize>,
}

impl Genome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, length: u64) {
        let offset = self.end();
        self.by_name.insert(name.to_string(), self.scaffolds.len());
        self.scaffolds.push(Scaffold {
            name: name.to_string(),
            length,
            offset,
        });
    }

    pub fn scaffolds(&self) -> &[Scaffold] {
        &self.scaffolds
    }

    pub fn len(&self) -> usize {
        self.scaffolds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scaffolds.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, index: usize) -> &Scaffold {
        &self.scaffolds[index]
    }

    /// Cumulative end coordinate of the last scaffold.
    pub fn end(&self) -> u64 {
        self.scaffolds
            .last()
            .map(|s| s.offset + s.length)
            .unwrap_or(0)
    }
}

/// Genomic intervals excluded from scoring. Intervals are inclusive on
/// both ends and merged per scaffold at load time.
#[derive(Debug, Default)]
pub struct Mask {
    intervals: HashMap<String, Vec<(u64, u64)>>,
}

impl Mask {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a three-column `scaffold<TAB>begin<TAB>end` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut raw: HashMap<String, Vec<(u64, u64)>> = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.trim_end().split('\t').collect();
            if fields.len() < 3 {
                return Err(BsaError::configuration(format!(
                    "masking file line has {} columns, expected scaffold, begin, end",
                    fields.len()
                )));
            }
            let begin: u64 = fields[1].parse().map_err(|_| {
                BsaError::configuration(format!(
                    "masking coordinate '{}' is not an integer",
                    fields[1]
                ))
            })?;
            let end: u64 = fields[2].parse().map_err(|_| {
                BsaError::configuration(format!(
                    "masking coordinate '{}' is not an integer",
                    fields[2]
                ))
            })?;
            raw.entry(fields[0].to_string())
                .or_default()
                .push((begin.min(end), begin.max(end)));
        }

        let mut intervals = HashMap::new();
        for (scaffold, mut spans) in raw {
            spans.sort_unstable();
            let mut merged: Vec<(u64, u64)> = Vec::with_capacity(spans.len());
            for (begin, end) in spans {
                match merged.last_mut() {
                    Some(last) if begin <= last.1 + 1 => last.1 = last.1.max(end),
                    _ => merged.push((begin, end)),
                }
            }
            intervals.insert(scaffold, merged);
        }
        Ok(Mask { intervals })
    }

    pub fn contains(&self, scaffold: &str, pos: u64) -> bool {
        let Some(spans) = self.intervals.get(scaffold) else {
            return false;
        };
        let idx = spans.partition_point(|&(begin, _)| begin <= pos);
        idx > 0 && pos <= spans[idx - 1].1
    }
}
