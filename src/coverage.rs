//! Coverage profiling: one pass over the VCF that yields the qualifying
//! scaffold table and each tracked sample's genome-wide mean read depth.

use crate::config::Settings;
use crate::error::{BsaError, Result};
use crate::genome::Genome;
use crate::vcf::{self, DataRow};
use std::collections::HashMap;
use std::io::BufRead;

macro_rules! progress {
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}

/// Per-sample average allele depth, computed once and read-only after.
#[derive(Debug, Default)]
pub struct CoverageProfile {
    baselines: HashMap<String, f64>,
}

impl CoverageProfile {
    pub fn get(&self, sample: &str) -> Option<f64> {
        self.baselines.get(sample).copied()
    }

    #[cfg(test)]
    pub fn from_baselines(baselines: HashMap<String, f64>) -> Self {
        CoverageProfile { baselines }
    }
}

/// Stream the VCF once: build the qualifying-scaffold table from the
/// `##contig` header lines and accumulate depth sums and call counts for
/// every tracked sample at single-nucleotide biallelic sites.
pub fn profile(settings: &Settings) -> Result<(Genome, CoverageProfile)> {
    progress!(
        settings.quiet,
        "Profiling read coverage across the VCF..."
    );

    let tracked = settings.tracked_samples();
    let reader = vcf::open_vcf_reader(&settings.vcf)?;

    let mut genome = Genome::new();
    // (sample name, VCF column, depth sum, call count)
    let mut accum: Vec<(String, usize, f64, u64)> = Vec::new();
    let mut header_seen = false;
    let mut lines: u64 = 0;

    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            if let Some(contig) = vcf::parse_contig_line(&line) {
                if contig.length >= settings.min_scaffold {
                    genome.push(&contig.name, contig.length);
                }
            } else if line.starts_with("#CHROM") {
                let header = vcf::parse_sample_header(&line);
                let missing: Vec<&String> = tracked
                    .iter()
                    .filter(|name| !header.contains(*name))
                    .collect();
                if !missing.is_empty() {
                    let names: Vec<String> =
                        missing.iter().map(|s| s.to_string()).collect();
                    return Err(BsaError::configuration(format!(
                        "sample name(s) not found in VCF header: {}",
                        names.join(",")
                    )));
                }
                for (column, name) in header.iter().enumerate() {
                    if tracked.contains(name) {
                        accum.push((name.clone(), column, 0.0, 0));
                    }
                }
                header_seen = true;
            }
            continue;
        }

        if !header_seen {
            return Err(BsaError::parse("VCF data line before #CHROM header"));
        }

        lines += 1;
        if lines % 100_000 == 0 {
            progress!(settings.quiet, "  {} records scanned...", lines);
        }

        let line = vcf::normalize_phase(&line);
        let Some(row) = DataRow::parse(&line) else {
            continue;
        };
        if genome.index_of(row.chrom()).is_none() || !row.is_snp() {
            continue;
        }
        for entry in accum.iter_mut() {
            let call = row.sample(entry.1);
            if call.is_missing() {
                continue;
            }
            if let Some(depth) = call.total_depth() {
                entry.2 += depth;
                entry.3 += 1;
            }
        }
    }

    if genome.is_empty() {
        return Err(BsaError::insufficient_data(format!(
            "no scaffold in the VCF header reaches the minimum length of {}",
            settings.min_scaffold
        )));
    }
    if accum.is_empty() {
        return Err(BsaError::parse("VCF has no #CHROM header line"));
    }

    let mut baselines = HashMap::new();
    for (name, _, depth_sum, calls) in accum {
        let baseline = if calls > 0 {
            depth_sum / calls as f64
        } else {
            0.0
        };
        baselines.insert(name, baseline);
    }

    Ok((genome, CoverageProfile { baselines }))
}
