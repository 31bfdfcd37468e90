//! The scored-variant index: per scaffold, a position-sorted record list
//! plus a coarse bin-offset table so window lookups scan only nearby
//! records instead of the whole scaffold.

use crate::genome::Genome;

/// Scores for one site, keyed by output-sample id.
pub type SampleScores = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub struct ScoredSite {
    pub pos: u64,
    pub scores: SampleScores,
}

#[derive(Debug, Default)]
struct ScaffoldSites {
    sites: Vec<ScoredSite>,
    /// `bin_offsets[b]` is the index of the first site at or past bin `b`.
    bin_offsets: Vec<usize>,
    /// Whether any quality-annotated record landed on this scaffold.
    touched: bool,
}

/// Running tallies for the scan, used only for reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanCounts {
    pub seen: u64,
    pub quality: u64,
    pub scored: u64,
}

#[derive(Debug)]
pub struct VariantIndex {
    binsize: u64,
    per_scaffold: Vec<ScaffoldSites>,
}

fn bin_of(pos: u64, binsize: u64) -> usize {
    (pos.saturating_sub(1) / binsize) as usize
}

impl VariantIndex {
    pub fn new(genome: &Genome, binsize: u64) -> Self {
        let mut per_scaffold = Vec::with_capacity(genome.len());
        per_scaffold.resize_with(genome.len(), ScaffoldSites::default);
        VariantIndex {
            binsize,
            per_scaffold,
        }
    }

    pub fn binsize(&self) -> u64 {
        self.binsize
    }

    /// Mark a scaffold as carrying annotated records, independent of
    /// whether any of them score.
    pub fn touch(&mut self, scaffold: usize) {
        self.per_scaffold[scaffold].touched = true;
    }

    pub fn is_touched(&self, scaffold: usize) -> bool {
        self.per_scaffold[scaffold].touched
    }

    pub fn push(&mut self, scaffold: usize, pos: u64, scores: SampleScores) {
        self.per_scaffold[scaffold]
            .sites
            .push(ScoredSite { pos, scores });
    }

    /// Sort each scaffold's records, drop duplicate positions (last call
    /// wins), and build the bin-offset tables.
    pub fn finalize(&mut self, genome: &Genome) {
        for (si, entry) in self.per_scaffold.iter_mut().enumerate() {
            entry.sites.sort_by_key(|s| s.pos);
            entry.sites.reverse();
            entry.sites.dedup_by_key(|s| s.pos);
            entry.sites.reverse();

            let nbins = bin_of(genome.get(si).length.max(1), self.binsize) + 1;
            let mut offsets = Vec::with_capacity(nbins + 1);
            let mut idx = 0;
            for b in 0..=nbins {
                while idx < entry.sites.len() && bin_of(entry.sites[idx].pos, self.binsize) < b
                {
                    idx += 1;
                }
                offsets.push(idx);
            }
            entry.bin_offsets = offsets;
        }
    }

    pub fn sites(&self, scaffold: usize) -> &[ScoredSite] {
        &self.per_scaffold[scaffold].sites
    }

    /// All sites with position in `[start, end]`, located through the bin
    /// table so the scan cost is bounded by the window's bins.
    pub fn window_sites(&self, scaffold: usize, start: u64, end: u64) -> &[ScoredSite] {
        let entry = &self.per_scaffold[scaffold];
        if entry.sites.is_empty() || entry.bin_offsets.is_empty() {
            return &[];
        }
        let nbins = entry.bin_offsets.len() - 1;
        let lo_bin = bin_of(start.max(1), self.binsize).min(nbins);
        let hi_bin = (bin_of(end.max(1), self.binsize) + 1).min(nbins);

        let mut first = entry.bin_offsets[lo_bin];
        while first < entry.sites.len() && entry.sites[first].pos < start {
            first += 1;
        }
        let bound = entry.bin_offsets[hi_bin];
        let last = first + entry.sites[first..bound].partition_point(|s| s.pos <= end);
        &entry.sites[first..last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_genome() -> Genome {
        let mut genome = Genome::new();
        genome.push("chr1", 600_000);
        genome.push("chr2", 800_000);
        genome
    }

    fn build_index(positions: &[u64]) -> (Genome, VariantIndex) {
        let genome = test_genome();
        let mut index = VariantIndex::new(&genome, 100_000);
        index.touch(0);
        for &pos in positions {
            index.push(0, pos, vec![(0, 0.5)]);
        }
        index.finalize(&genome);
        (genome, index)
    }

    #[test]
    fn test_window_sites_inclusive_bounds() {
        let (_, index) = build_index(&[1_000, 5_000, 75_000, 75_001, 150_000]);
        let hits: Vec<u64> = index
            .window_sites(0, 1_000, 75_000)
            .iter()
            .map(|s| s.pos)
            .collect();
        assert_eq!(hits, vec![1_000, 5_000, 75_000]);
    }

    #[test]
    fn test_window_sites_across_bins() {
        let (_, index) = build_index(&[99_999, 100_000, 100_001, 250_000]);
        let hits: Vec<u64> = index
            .window_sites(0, 95_000, 170_000)
            .iter()
            .map(|s| s.pos)
            .collect();
        assert_eq!(hits, vec![99_999, 100_000, 100_001]);
    }

    #[test]
    fn test_window_sites_empty_region() {
        let (_, index) = build_index(&[400_000]);
        assert!(index.window_sites(0, 0, 75_000).is_empty());
        assert!(index.window_sites(1, 0, 75_000).is_empty());
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let (_, index) = build_index(&[300_000, 1_000, 150_000]);
        let all: Vec<u64> = index.sites(0).iter().map(|s| s.pos).collect();
        assert_eq!(all, vec![1_000, 150_000, 300_000]);
    }

    #[test]
    fn test_duplicate_position_last_wins() {
        let genome = test_genome();
        let mut index = VariantIndex::new(&genome, 100_000);
        index.push(0, 1_000, vec![(0, 0.25)]);
        index.push(0, 1_000, vec![(0, 0.75)]);
        index.finalize(&genome);
        assert_eq!(index.sites(0).len(), 1);
        assert_eq!(index.sites(0)[0].scores[0].1, 0.75);
    }

    #[test]
    fn test_touched_tracking() {
        let genome = test_genome();
        let mut index = VariantIndex::new(&genome, 100_000);
        index.touch(1);
        assert!(!index.is_touched(0));
        assert!(index.is_touched(1));
    }
}
