//! The scoring pass: stream the VCF, filter sites, and build the
//! scored-variant index.

use crate::config::Settings;
use crate::coverage::CoverageProfile;
use crate::error::{BsaError, Result};
use crate::genome::{Genome, Mask};
use crate::index::{ScanCounts, VariantIndex};
use crate::scorer::Scorer;
use crate::vcf::{self, DataRow, SiteQuals};
use std::io::BufRead;

macro_rules! progress {
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}

/// Stream the VCF and score every qualifying site.
///
/// A record is scored only if it is a single-nucleotide biallelic site on a
/// qualifying scaffold, carries all five quality annotations, is not
/// masked, and clears the quality thresholds. Malformed or incomplete
/// records are dropped silently; the counters keep the tallies apart.
pub fn scan_vcf(
    settings: &Settings,
    genome: &Genome,
    coverage: &CoverageProfile,
) -> Result<(VariantIndex, ScanCounts)> {
    progress!(settings.quiet, "Scanning VCF for scoreable variants...");

    let mask = match &settings.masking_file {
        Some(path) => Mask::from_file(path)?,
        None => Mask::empty(),
    };

    let mut index = VariantIndex::new(genome, settings.binsize);
    let mut counts = ScanCounts::default();
    let mut scorer: Option<Scorer> = None;

    let reader = vcf::open_vcf_reader(&settings.vcf)?;
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            if line.starts_with("#CHROM") {
                let samples = vcf::parse_sample_header(&line);
                scorer = Some(Scorer::new(settings, &samples, coverage)?);
            }
            continue;
        }
        let Some(scorer) = scorer.as_ref() else {
            return Err(BsaError::parse("VCF data line before #CHROM header"));
        };

        let line = vcf::normalize_phase(&line);
        let Some(row) = DataRow::parse(&line) else {
            continue;
        };
        let Some(scaffold) = genome.index_of(row.chrom()) else {
            continue;
        };
        if !row.is_snp() {
            continue;
        }
        counts.seen += 1;
        if counts.seen % 100_000 == 0 {
            progress!(settings.quiet, "  {} SNPs considered...", counts.seen);
        }

        let quals = SiteQuals::parse(row.info());
        let (Some(qd), Some(mq), Some(sor), Some(mqrs), Some(rprs)) = (
            quals.qd,
            quals.mq,
            quals.sor,
            quals.mq_rank_sum,
            quals.read_pos_rank_sum,
        ) else {
            continue;
        };
        index.touch(scaffold);

        let Some(pos) = row.pos() else {
            continue;
        };
        if mask.contains(row.chrom(), pos) {
            continue;
        }
        if qd < settings.qds
            || mq < settings.mps
            || sor >= settings.sor
            || mqrs < settings.mqrs
            || rprs < settings.rprs
        {
            continue;
        }
        counts.quality += 1;

        let scores = scorer.score(&row);
        if scores.is_empty() {
            continue;
        }
        counts.scored += 1;
        index.push(scaffold, pos, scores);
    }

    index.finalize(genome);

    progress!(settings.quiet, "  Total SNPs considered: {}", counts.seen);
    progress!(
        settings.quiet,
        "  SNPs passing quality filters: {}",
        counts.quality
    );
    progress!(
        settings.quiet,
        "  SNPs passing BSA filters: {}",
        counts.scored
    );

    Ok((index, counts))
}
