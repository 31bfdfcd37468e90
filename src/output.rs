//! Tab-separated writers for the interface files shared with downstream
//! tooling (plotting, re-runs, inspection).

use crate::coverage::CoverageProfile;
use crate::error::Result;
use crate::genome::Genome;
use crate::index::VariantIndex;
use crate::window::Track;
use csv::WriterBuilder;
use std::path::Path;

fn tab_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    Ok(WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?)
}

/// `scaffold<TAB>length`, one per line, in header order.
pub fn write_scaffold_table(genome: &Genome, path: &Path) -> Result<()> {
    let mut wtr = tab_writer(path)?;
    for scaffold in genome.scaffolds() {
        wtr.write_record([&scaffold.name, &scaffold.length.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// `sample<TAB>mean-depth`, one per tracked sample.
pub fn write_coverage_table(
    samples: &[String],
    coverage: &CoverageProfile,
    path: &Path,
) -> Result<()> {
    let mut wtr = tab_writer(path)?;
    for sample in samples {
        if let Some(baseline) = coverage.get(sample) {
            wtr.write_record([sample, &baseline.to_string()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// `position<TAB>value<TAB>variant-count` for one sample's windows.
/// Interpolated entries carry the −1 sentinel.
pub fn write_track(track: &Track, path: &Path) -> Result<()> {
    let mut wtr = tab_writer(path)?;
    for i in 0..track.len() {
        wtr.write_record([
            track.pos[i].to_string(),
            track.val[i].to_string(),
            track.nvr[i].to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// `position<TAB>value` pairs (the averaged difference signal).
pub fn write_pairs(pos: &[f64], val: &[f64], path: &Path) -> Result<()> {
    let mut wtr = tab_writer(path)?;
    for (p, v) in pos.iter().zip(val.iter()) {
        wtr.write_record([p.to_string(), v.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Verbose dump of every scored site, one file per sample:
/// `scaffold<TAB>position<TAB>bin-start<TAB>score`.
pub fn write_site_dump(
    index: &VariantIndex,
    genome: &Genome,
    samples: &[String],
    dir: &Path,
) -> Result<()> {
    let mut writers = Vec::with_capacity(samples.len());
    for sample in samples {
        writers.push(tab_writer(&dir.join(format!("{}.txt", sample)))?);
    }
    for si in 0..genome.len() {
        let scaffold = &genome.get(si).name;
        for site in index.sites(si) {
            let bin_start = (site.pos.saturating_sub(1) / index.binsize()) * index.binsize() + 1;
            for &(id, score) in &site.scores {
                writers[id].write_record([
                    scaffold,
                    &site.pos.to_string(),
                    &bin_start.to_string(),
                    &score.to_string(),
                ])?;
            }
        }
    }
    for mut wtr in writers {
        wtr.flush()?;
    }
    Ok(())
}
