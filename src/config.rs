//! Run configuration: raw options in, one immutable [`Settings`] out.
//!
//! Every component takes `&Settings`; nothing mutates it after
//! [`RunOptions::resolve`] returns.

use crate::error::{BsaError, Result};
use std::path::PathBuf;

/// Which genotype-scoring model the run uses. Decided once from the
/// configured sample roles and never re-inspected per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossDesign {
    /// Selected and control parents plus both offspring pools.
    FourRole,
    /// As `FourRole`, with one parent hemizygous.
    Haplodiploid,
    /// Only one (major) parent genotyped.
    MajorParent,
    /// No parental genotypes at all.
    NoParent,
}

/// Raw, unvalidated options as they come off the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub vcf: PathBuf,
    pub outdir: PathBuf,
    pub selected_parent: Vec<String>,
    pub control_parent: Vec<String>,
    pub major_parent: Vec<String>,
    pub haplodiploid: Option<String>,
    pub selected_offspring: Vec<String>,
    pub control_offspring: Vec<String>,
    pub mac: f64,
    pub coverage_over: f64,
    pub coverage_under: f64,
    pub qds: f64,
    pub sor: f64,
    pub mps: f64,
    pub mqrs: f64,
    pub rprs: f64,
    pub binsize: u64,
    pub window: u64,
    pub slide: u64,
    pub min_allele: Option<f64>,
    pub min_scaffold: u64,
    pub perm: usize,
    pub sig: f64,
    pub unpaired: bool,
    pub threads: usize,
    pub combinations: usize,
    pub masking_file: Option<PathBuf>,
    pub seed: u64,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            vcf: PathBuf::new(),
            outdir: PathBuf::new(),
            selected_parent: Vec::new(),
            control_parent: Vec::new(),
            major_parent: Vec::new(),
            haplodiploid: None,
            selected_offspring: Vec::new(),
            control_offspring: Vec::new(),
            mac: 0.95,
            coverage_over: 1.50,
            coverage_under: 0.25,
            qds: 2.0,
            sor: 3.0,
            mps: 50.0,
            mqrs: -8.0,
            rprs: -8.0,
            binsize: 100_000,
            window: 75_000,
            slide: 5_000,
            min_allele: None,
            min_scaffold: 500_000,
            perm: 0,
            sig: 0.05,
            unpaired: false,
            threads: 1,
            combinations: 1,
            masking_file: None,
            seed: 0,
            verbose: false,
            quiet: false,
        }
    }
}

/// Final, immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub vcf: PathBuf,
    pub outdir: PathBuf,
    pub design: CrossDesign,
    pub selected_parent: Vec<String>,
    pub control_parent: Vec<String>,
    pub major_parent: Vec<String>,
    pub haplodiploid: Option<String>,
    pub selected_offspring: Vec<String>,
    pub control_offspring: Vec<String>,
    pub mac: f64,
    pub coverage_over: f64,
    pub coverage_under: f64,
    pub qds: f64,
    pub sor: f64,
    pub mps: f64,
    pub mqrs: f64,
    pub rprs: f64,
    pub binsize: u64,
    pub window: u64,
    pub slide: u64,
    pub min_allele: f64,
    pub min_scaffold: u64,
    pub perm: usize,
    pub sig: f64,
    pub unpaired: bool,
    pub threads: usize,
    pub combinations: usize,
    pub masking_file: Option<PathBuf>,
    pub seed: u64,
    pub verbose: bool,
    pub quiet: bool,
}

fn factorial(n: usize) -> usize {
    (1..=n).product::<usize>().max(1)
}

fn broadcast(groups: &mut [&mut Vec<String>]) -> Result<()> {
    let mut lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    lengths.sort_unstable();
    lengths.dedup();
    match lengths.as_slice() {
        [_] => Ok(()),
        [1, n] => {
            let n = *n;
            for group in groups.iter_mut() {
                if group.len() == 1 {
                    let name = group[0].clone();
                    group.resize(n, name);
                }
            }
            Ok(())
        }
        _ => Err(BsaError::configuration(
            "sample groups have different numbers of replicates",
        )),
    }
}

impl RunOptions {
    /// Validate and finish the configuration: pick the scoring design,
    /// broadcast singleton replicate lists, and fill derived defaults.
    pub fn resolve(mut self) -> Result<Settings> {
        if self.selected_offspring.is_empty() || self.control_offspring.is_empty() {
            return Err(BsaError::configuration(
                "both selected and control offspring must be provided",
            ));
        }

        let has_sel = !self.selected_parent.is_empty();
        let has_con = !self.control_parent.is_empty();
        if has_sel != has_con {
            return Err(BsaError::configuration(
                "selected and control parents must be provided together",
            ));
        }

        let design = if has_sel && has_con {
            if self.haplodiploid.is_some() {
                CrossDesign::Haplodiploid
            } else {
                CrossDesign::FourRole
            }
        } else if !self.major_parent.is_empty() {
            CrossDesign::MajorParent
        } else {
            CrossDesign::NoParent
        };

        if self.haplodiploid.is_some() && design != CrossDesign::Haplodiploid {
            return Err(BsaError::configuration(
                "a haplodiploid parent requires both selected and control parents",
            ));
        }
        if design == CrossDesign::NoParent && self.perm > 0 {
            return Err(BsaError::configuration(
                "cannot run permutations without parental data",
            ));
        }
        if self.binsize == 0 || self.window == 0 || self.slide == 0 {
            return Err(BsaError::configuration(
                "binsize, window, and slide must all be positive",
            ));
        }

        // Combinations are derived from the control list as given, before
        // singleton broadcast.
        let combinations = if self.unpaired {
            if self.combinations > 1 {
                self.combinations
            } else {
                factorial(self.control_offspring.len())
            }
        } else {
            1
        };
        let threads = if self.unpaired { self.threads.max(1) } else { 1 };

        match design {
            CrossDesign::FourRole | CrossDesign::Haplodiploid => broadcast(&mut [
                &mut self.selected_offspring,
                &mut self.control_offspring,
                &mut self.selected_parent,
                &mut self.control_parent,
            ])?,
            CrossDesign::MajorParent => broadcast(&mut [
                &mut self.selected_offspring,
                &mut self.control_offspring,
                &mut self.major_parent,
            ])?,
            CrossDesign::NoParent => broadcast(&mut [
                &mut self.selected_offspring,
                &mut self.control_offspring,
            ])?,
        }

        let min_allele = self
            .min_allele
            .unwrap_or(self.window as f64 * 0.000_50);

        Ok(Settings {
            vcf: self.vcf,
            outdir: self.outdir,
            design,
            selected_parent: self.selected_parent,
            control_parent: self.control_parent,
            major_parent: self.major_parent,
            haplodiploid: self.haplodiploid,
            selected_offspring: self.selected_offspring,
            control_offspring: self.control_offspring,
            mac: self.mac,
            coverage_over: self.coverage_over,
            coverage_under: self.coverage_under,
            qds: self.qds,
            sor: self.sor,
            mps: self.mps,
            mqrs: self.mqrs,
            rprs: self.rprs,
            binsize: self.binsize,
            window: self.window,
            slide: self.slide,
            min_allele,
            min_scaffold: self.min_scaffold,
            perm: self.perm,
            sig: self.sig,
            unpaired: self.unpaired,
            threads,
            combinations,
            masking_file: self.masking_file,
            seed: self.seed,
            verbose: self.verbose,
            quiet: self.quiet,
        })
    }
}

impl Settings {
    /// Unique offspring sample names, selected first, in configured order.
    /// These are the samples that receive scores and window tracks.
    pub fn output_samples(&self) -> Vec<String> {
        let mut out = Vec::new();
        for name in self
            .selected_offspring
            .iter()
            .chain(self.control_offspring.iter())
        {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }

    /// Every unique configured sample name, offspring first then parents.
    pub fn tracked_samples(&self) -> Vec<String> {
        let mut out = self.output_samples();
        for name in self
            .selected_parent
            .iter()
            .chain(self.control_parent.iter())
            .chain(self.major_parent.iter())
        {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }

    pub fn replicates(&self) -> usize {
        self.selected_offspring.len()
    }

    pub fn info_dir(&self) -> PathBuf {
        self.outdir.join("info_files")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.outdir.join("BSA_output")
    }
}
