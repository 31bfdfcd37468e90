//! Sliding-window aggregation of per-site scores.

use crate::config::Settings;
use crate::genome::Genome;
use crate::index::VariantIndex;

/// One sample's window sequence: genome-wide midpoint positions, mean
/// scores, and supporting variant counts (−1 marks interpolated entries).
#[derive(Debug, Clone, Default)]
pub struct Track {
    pub pos: Vec<f64>,
    pub val: Vec<f64>,
    pub nvr: Vec<i64>,
}

impl Track {
    pub fn push(&mut self, pos: f64, val: f64, nvr: i64) {
        self.pos.push(pos);
        self.val.push(val);
        self.nvr.push(nvr);
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }
}

/// Window tracks for every output sample, in `Settings::output_samples`
/// order.
#[derive(Debug, Clone)]
pub struct WindowSet {
    pub samples: Vec<String>,
    pub tracks: Vec<Track>,
}

impl WindowSet {
    pub fn track(&self, sample: &str) -> Option<&Track> {
        let idx = self.samples.iter().position(|s| s == sample)?;
        Some(&self.tracks[idx])
    }
}

/// Slide a fixed-length window along every scaffold that carries data,
/// averaging each sample's scores over the positions inside
/// `[start, start + window]`. A window is emitted for a sample only when
/// its supporting count reaches `min_allele`.
pub fn slide_windows(
    settings: &Settings,
    genome: &Genome,
    index: &VariantIndex,
) -> WindowSet {
    let samples = settings.output_samples();
    let mut tracks = vec![Track::default(); samples.len()];
    let mut sums = vec![0.0f64; samples.len()];
    let mut counts = vec![0u64; samples.len()];

    for (si, scaffold) in genome.scaffolds().iter().enumerate() {
        if !index.is_touched(si) {
            continue;
        }
        let mut start: u64 = 0;
        while start + settings.window <= scaffold.length + settings.slide {
            let end = start + settings.window;
            let midpoint =
                scaffold.offset as f64 + (start as f64 + end as f64) / 2.0;

            sums.fill(0.0);
            counts.fill(0);
            for site in index.window_sites(si, start, end) {
                for &(id, score) in &site.scores {
                    sums[id] += score;
                    counts[id] += 1;
                }
            }
            for id in 0..samples.len() {
                if counts[id] > 0 && counts[id] as f64 >= settings.min_allele {
                    tracks[id].push(midpoint, sums[id] / counts[id] as f64, counts[id] as i64);
                }
            }
            start += settings.slide;
        }
    }

    WindowSet { samples, tracks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use approx::assert_relative_eq;

    fn settings() -> Settings {
        RunOptions {
            selected_offspring: vec!["osel".into()],
            control_offspring: vec!["ocon".into()],
            window: 75_000,
            slide: 5_000,
            min_allele: Some(5.0),
            ..RunOptions::default()
        }
        .resolve()
        .unwrap()
    }

    fn dense_index(genome: &Genome, step: u64) -> VariantIndex {
        let mut index = VariantIndex::new(genome, 100_000);
        for (si, scaffold) in genome.scaffolds().iter().enumerate() {
            index.touch(si);
            let mut pos = step;
            while pos <= scaffold.length {
                index.push(si, pos, vec![(0, 0.5), (1, 0.25)]);
                pos += step;
            }
        }
        index.finalize(genome);
        index
    }

    #[test]
    fn test_window_count_and_spacing() {
        let mut genome = Genome::new();
        genome.push("chr1", 600_000);
        genome.push("chr2", 800_000);
        let settings = settings();
        let index = dense_index(&genome, 1_000);
        let windows = slide_windows(&settings, &genome, &index);

        // starts run while start + window <= length + slide
        let expected = (530_000 / 5_000 + 1) + (730_000 / 5_000 + 1);
        assert_eq!(windows.tracks[0].len(), expected);

        // positions strictly increase and step by slide within a scaffold
        let pos = &windows.tracks[0].pos;
        for pair in pos.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_relative_eq!(pos[0], 37_500.0);
        assert_relative_eq!(pos[1] - pos[0], 5_000.0);
        // first window of the second scaffold is offset genome-wide
        let first_chr2 = pos.iter().find(|&&p| p > 600_000.0).unwrap();
        assert_relative_eq!(*first_chr2, 600_000.0 + 37_500.0);
    }

    #[test]
    fn test_window_means_and_counts() {
        let mut genome = Genome::new();
        genome.push("chr1", 600_000);
        let settings = settings();
        let index = dense_index(&genome, 1_000);
        let windows = slide_windows(&settings, &genome, &index);

        for (val, nvr) in windows.tracks[0]
            .val
            .iter()
            .zip(windows.tracks[0].nvr.iter())
        {
            assert_relative_eq!(*val, 0.5);
            assert!(*nvr >= 5);
        }
        for val in &windows.tracks[1].val {
            assert_relative_eq!(*val, 0.25);
        }
    }

    #[test]
    fn test_min_allele_gate() {
        let mut genome = Genome::new();
        genome.push("chr1", 600_000);
        let settings = settings();
        // a single site cannot reach min_allele = 5
        let mut index = VariantIndex::new(&genome, 100_000);
        index.touch(0);
        index.push(0, 10_000, vec![(0, 0.5)]);
        index.finalize(&genome);
        let windows = slide_windows(&settings, &genome, &index);
        assert!(windows.tracks[0].is_empty());
        assert!(windows.tracks[1].is_empty());
    }

    #[test]
    fn test_untouched_scaffold_skipped() {
        let mut genome = Genome::new();
        genome.push("chr1", 600_000);
        let settings = settings();
        let index = VariantIndex::new(&genome, 100_000);
        let windows = slide_windows(&settings, &genome, &index);
        assert!(windows.tracks[0].is_empty());
    }
}
