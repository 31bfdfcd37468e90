//! Gap filling: align every sample's window sequence onto one common,
//! evenly spaced position grid so tracks can be subtracted, averaged, and
//! permuted element-wise.

use crate::config::Settings;
use crate::error::{BsaError, Result};
use crate::genome::Genome;
use crate::window::{Track, WindowSet};

/// Sentinel variant count for interpolated entries.
pub const FILLED: i64 = -1;

const MAX_ROUNDS: usize = 100;

/// `n` evenly spaced values strictly between `start` and `end`.
pub fn afill(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let step = (end - start) / (n + 1) as f64;
    (1..=n).map(|i| start + i as f64 * step).collect()
}

/// Half-open float range `[start, end)` with a fixed step.
pub fn arange(start: f64, end: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut i = 0u64;
    loop {
        let v = start + i as f64 * step;
        if v >= end {
            return out;
        }
        out.push(v);
        i += 1;
    }
}

/// The largest position interval shared by every track, found by
/// iteratively re-deriving each track's min/max inside the current bounds
/// until they agree. Failure to converge means the window and threshold
/// settings left too little overlapping data.
fn shared_bounds(tracks: &[Track]) -> Result<(f64, f64)> {
    let mut lo = f64::NEG_INFINITY;
    let mut hi = f64::INFINITY;

    for _ in 0..MAX_ROUNDS {
        let mut mins = Vec::with_capacity(tracks.len());
        let mut maxes = Vec::with_capacity(tracks.len());
        for track in tracks {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &p in &track.pos {
                if p >= lo && p <= hi {
                    min = min.min(p);
                    max = max.max(p);
                }
            }
            if min > max {
                return Err(BsaError::insufficient_data(
                    "a sample has no windows inside the shared interval; \
                     consider relaxing quality or window settings",
                ));
            }
            mins.push(min);
            maxes.push(max);
        }
        let new_lo = mins.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let new_hi = maxes.iter().cloned().fold(f64::INFINITY, f64::min);
        if mins.iter().all(|&m| m == new_lo) && maxes.iter().all(|&m| m == new_hi) {
            return Ok((new_lo, new_hi));
        }
        lo = new_lo;
        hi = new_hi;
    }

    Err(BsaError::insufficient_data(
        "window grids failed to converge onto a shared interval; \
         consider relaxing quality or window settings",
    ))
}

/// Walk one track's retained positions, keeping slide-adjacent entries
/// verbatim and linearly interpolating across larger gaps.
fn fill_track(track: &Track, lo: f64, hi: f64, slide: f64) -> Track {
    let mut out = Track::default();
    let mut prev: Option<usize> = None;
    for i in 0..track.len() {
        let pos = track.pos[i];
        if pos < lo || pos > hi {
            continue;
        }
        if let Some(p) = prev {
            let gap = pos - track.pos[p];
            let steps = (gap / slide).round() as i64;
            if steps > 1 {
                let n = (steps - 1) as usize;
                for (fp, fv) in afill(track.pos[p], pos, n)
                    .into_iter()
                    .zip(afill(track.val[p], track.val[i], n))
                {
                    out.push(fp, fv, FILLED);
                }
            }
        }
        out.push(pos, track.val[i], track.nvr[i]);
        prev = Some(i);
    }
    out
}

/// Pad a filled track out to the genome boundaries. Leading fills climb
/// from position zero to the shared start; trailing fills run from the
/// shared end toward the genome end. Values interpolate between the raw
/// track's last and first means, trailing fills taking the first portion.
fn pad_track(
    filled: Track,
    raw: &Track,
    lo: f64,
    hi: f64,
    genome_end: f64,
    slide: f64,
    half_window: f64,
) -> Track {
    let end_pos = if genome_end - hi > slide {
        arange(hi + slide, genome_end, slide)
    } else {
        Vec::new()
    };
    let beg_pos = if lo - slide > slide {
        let mut v = arange(0.0, half_window, slide);
        if !v.is_empty() {
            v.remove(0);
        }
        v.extend(arange(half_window, lo, slide));
        v
    } else {
        Vec::new()
    };

    let n_end = end_pos.len();
    let n_beg = beg_pos.len();
    if n_end + n_beg == 0 {
        return filled;
    }
    let (Some(&last), Some(&first)) = (raw.val.last(), raw.val.first()) else {
        return filled;
    };
    let fill_vals = afill(last, first, n_end + n_beg);

    let mut out = Track::default();
    for (p, v) in beg_pos.iter().zip(fill_vals[n_end..].iter()) {
        out.push(*p, *v, FILLED);
    }
    for i in 0..filled.len() {
        out.push(filled.pos[i], filled.val[i], filled.nvr[i]);
    }
    for (p, v) in end_pos.iter().zip(fill_vals[..n_end].iter()) {
        out.push(*p, *v, FILLED);
    }
    out
}

/// Force every sample's window sequence onto one common grid.
pub fn fill_in(
    settings: &Settings,
    genome: &Genome,
    windows: &WindowSet,
) -> Result<WindowSet> {
    let (lo, hi) = shared_bounds(&windows.tracks)?;
    let slide = settings.slide as f64;
    let half_window = settings.window as f64 / 2.0;
    let genome_end = genome.end() as f64;

    let mut tracks = Vec::with_capacity(windows.tracks.len());
    for raw in &windows.tracks {
        let filled = fill_track(raw, lo, hi, slide);
        tracks.push(pad_track(
            filled,
            raw,
            lo,
            hi,
            genome_end,
            slide,
            half_window,
        ));
    }

    Ok(WindowSet {
        samples: windows.samples.clone(),
        tracks,
    })
}
