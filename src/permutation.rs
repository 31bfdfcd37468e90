//! Permutation significance testing on the aligned difference signal.
//!
//! Each selected/control pairing contributes a window-by-window difference
//! sequence. Combinations of pairings are permuted by independent circular
//! rotation; the peak statistic of the averaged rotated signal builds the
//! empirical null, and the cutoff is its upper percentile. Combinations run
//! in parallel; result lines funnel through a channel to one writer.

use crate::config::Settings;
use crate::error::{BsaError, Result};
use crate::stats;
use crate::window::WindowSet;
use indicatif::ProgressBar;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One pairing's aligned difference sequence (selected − control).
#[derive(Debug, Clone)]
pub struct DiffSeries {
    pub name: String,
    pub pos: Vec<f64>,
    pub val: Vec<f64>,
}

/// What the tester hands back to the driver.
#[derive(Debug)]
pub struct PermutationReport {
    /// Element-wise average of all paired difference sequences.
    pub average: DiffSeries,
    /// The paired difference sequences themselves.
    pub pairings: Vec<DiffSeries>,
    /// Maximum cutoff across combinations; `None` when trials are disabled.
    pub cutoff: Option<f64>,
}

fn difference(filled: &WindowSet, selected: &str, control: &str) -> Result<DiffSeries> {
    let sel = filled.track(selected).ok_or_else(|| {
        BsaError::configuration(format!("no window track for sample '{}'", selected))
    })?;
    let con = filled.track(control).ok_or_else(|| {
        BsaError::configuration(format!("no window track for sample '{}'", control))
    })?;
    Ok(DiffSeries {
        name: format!("{},{}", selected, control),
        pos: sel.pos.clone(),
        val: sel
            .val
            .iter()
            .zip(con.val.iter())
            .map(|(s, c)| s - c)
            .collect(),
    })
}

/// Element-wise average across pairings.
fn average_of(pairings: &[DiffSeries]) -> DiffSeries {
    let n = pairings[0].val.len();
    let mut val = vec![0.0; n];
    for series in pairings {
        for (acc, v) in val.iter_mut().zip(series.val.iter()) {
            *acc += v;
        }
    }
    let groups = pairings.len() as f64;
    for v in val.iter_mut() {
        *v /= groups;
    }
    DiffSeries {
        name: "average".to_string(),
        pos: pairings[0].pos.clone(),
        val,
    }
}

/// All orderings of `0..n`, in lexicographic order (identity first).
fn orderings_of(n: usize) -> Vec<Vec<usize>> {
    fn recurse(remaining: &mut Vec<usize>, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if remaining.is_empty() {
            out.push(current.clone());
            return;
        }
        for i in 0..remaining.len() {
            let item = remaining.remove(i);
            current.push(item);
            recurse(remaining, current, out);
            current.pop();
            remaining.insert(i, item);
        }
    }
    let mut out = Vec::new();
    let mut items: Vec<usize> = (0..n).collect();
    recurse(&mut items, &mut Vec::new(), &mut out);
    out
}

/// One trial: rotate every pairing independently, average, and take the
/// larger of |max| and |min|.
fn trial_peak(pairings: &[DiffSeries], rng: &mut ChaCha8Rng) -> f64 {
    let n = pairings[0].val.len();
    if n == 0 {
        return 0.0;
    }
    let mut acc = vec![0.0; n];
    for series in pairings {
        let offset = rng.random_range(0..=n) % n;
        for (i, slot) in acc.iter_mut().enumerate() {
            *slot += series.val[(offset + i) % n];
        }
    }
    let groups = pairings.len() as f64;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for v in acc {
        let avg = v / groups;
        max = max.max(avg);
        min = min.min(avg);
    }
    max.abs().max(min.abs())
}

fn combination_seed(base: u64, combination: usize) -> u64 {
    base ^ (combination as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Run the significance test over the gap-filled tracks.
///
/// The results file is truncated up front; each combination appends one
/// `names<TAB>cutoff` line through the single writer.
pub fn run(
    settings: &Settings,
    filled: &WindowSet,
    results_path: &Path,
    bar: Option<&ProgressBar>,
) -> Result<PermutationReport> {
    let paired: Vec<DiffSeries> = settings
        .selected_offspring
        .iter()
        .zip(settings.control_offspring.iter())
        .map(|(sel, con)| difference(filled, sel, con))
        .collect::<Result<_>>()?;
    let average = average_of(&paired);

    // the results file starts fresh every run
    File::create(results_path)?;

    if settings.perm == 0 {
        return Ok(PermutationReport {
            average,
            pairings: paired,
            cutoff: None,
        });
    }

    let mut combinations: Vec<Vec<DiffSeries>> = vec![paired.clone()];
    if settings.unpaired {
        let mut orderings = orderings_of(settings.control_offspring.len());
        orderings.remove(0); // the identity is the paired combination
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        orderings.shuffle(&mut rng);
        for ordering in orderings
            .into_iter()
            .take(settings.combinations.saturating_sub(1))
        {
            let combo: Vec<DiffSeries> = settings
                .selected_offspring
                .iter()
                .zip(ordering.iter().map(|&i| &settings.control_offspring[i]))
                .map(|(sel, con)| difference(filled, sel, con))
                .collect::<Result<_>>()?;
            combinations.push(combo);
        }
    }

    let (sender, receiver) = flume::unbounded::<String>();
    let writer_path = results_path.to_path_buf();
    let writer = std::thread::spawn(move || -> std::io::Result<()> {
        let mut out = BufWriter::new(
            std::fs::OpenOptions::new().append(true).open(writer_path)?,
        );
        for line in receiver {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    });

    let cutoffs: Vec<f64> = combinations
        .par_iter()
        .enumerate()
        .map(|(ci, combo)| {
            let mut rng = ChaCha8Rng::seed_from_u64(combination_seed(settings.seed, ci));
            let mut peaks = Vec::with_capacity(settings.perm);
            for _ in 0..settings.perm {
                peaks.push(trial_peak(combo, &mut rng));
                if let Some(bar) = bar {
                    bar.inc(1);
                }
            }
            let cutoff = stats::percentile(&peaks, (1.0 - settings.sig) * 100.0);
            let mut names: Vec<&str> = combo.iter().map(|s| s.name.as_str()).collect();
            names.sort_unstable();
            let _ = sender.send(format!("{}\t{}", names.join(";"), cutoff));
            cutoff
        })
        .collect();
    drop(sender);
    writer
        .join()
        .map_err(|_| BsaError::parse("permutation writer thread panicked"))??;

    let cutoff = cutoffs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Ok(PermutationReport {
        average,
        pairings: paired,
        cutoff: Some(cutoff),
    })
}
