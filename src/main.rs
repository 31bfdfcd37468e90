use anyhow::{Context, Result};
use bsa_scan::config::{RunOptions, Settings};
use bsa_scan::{coverage, fill, output, permutation, scan, window};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bsa-scan")]
#[command(version)]
#[command(about = "Bulk segregant analysis from VCF variant calls", long_about = None)]
struct Args {
    /// VCF file with BSA parents and offspring (can be gzipped)
    #[arg(short = 'v', long)]
    vcf: PathBuf,

    /// Directory where output files will be written
    #[arg(short, long)]
    outdir: PathBuf,

    /// Parent(s) with the trait of interest, comma-separated per cross
    #[arg(long, value_delimiter = ',')]
    selected_parent: Vec<String>,

    /// Parent(s) without the trait of interest, comma-separated per cross
    #[arg(long, value_delimiter = ',')]
    control_parent: Vec<String>,

    /// Known parent(s) when the other parent is not genotyped
    #[arg(long, value_delimiter = ',')]
    major_parent: Vec<String>,

    /// Name of the haplodiploid (hemizygous) parent
    #[arg(long)]
    haplodiploid: Option<String>,

    /// Offspring pool(s) with the trait of interest, comma-separated
    #[arg(long, value_delimiter = ',')]
    selected_offspring: Vec<String>,

    /// Offspring pool(s) without the trait of interest, comma-separated
    #[arg(long, value_delimiter = ',')]
    control_offspring: Vec<String>,

    /// Major allele cutoff; a locus is not considered segregating above it
    #[arg(long, default_value = "0.95")]
    mac: f64,

    /// Maximum read depth as a multiple of the genome-wide average
    #[arg(long, default_value = "1.50")]
    coverage_over: f64,

    /// Minimum read depth as a multiple of the genome-wide average
    #[arg(long, default_value = "0.25")]
    coverage_under: f64,

    /// Minimum quality-by-depth (QD) score
    #[arg(long, default_value = "2")]
    qds: f64,

    /// Maximum strand-odds-ratio (SOR) score
    #[arg(long, default_value = "3")]
    sor: f64,

    /// Minimum mean mapping quality (MQ) score
    #[arg(long = "mq", default_value = "50")]
    mps: f64,

    /// Minimum mapping-quality rank-sum score
    #[arg(long, default_value = "-8", allow_hyphen_values = true)]
    mqrs: f64,

    /// Minimum read-position rank-sum score
    #[arg(long, default_value = "-8", allow_hyphen_values = true)]
    rprs: f64,

    /// Genomic size of the bins indexing scored variants
    #[arg(short = 'b', long, default_value = "100000")]
    binsize: u64,

    /// Genomic length of the sliding windows
    #[arg(short = 'w', long, default_value = "75000")]
    window: u64,

    /// Genomic length by which windows slide across the genome
    #[arg(short = 's', long, default_value = "5000")]
    slide: u64,

    /// Minimum number of variants per window (default 0.0005 x window)
    #[arg(short = 'm', long)]
    min_allele: Option<f64>,

    /// Minimum chromosome/scaffold length
    #[arg(short = 'f', long, default_value = "500000")]
    min_scaffold: u64,

    /// Number of permutations to perform (0 disables the test)
    #[arg(long, default_value = "0")]
    perm: usize,

    /// Significance cutoff for the permutation test
    #[arg(long = "sig", default_value = "0.05")]
    significance: f64,

    /// Treat selected and control groups as unpaired
    #[arg(short = 'u', long)]
    unpaired: bool,

    /// Number of worker threads; only used when the data are unpaired
    #[arg(short = 'n', long, default_value_t = num_cpus())]
    threads: usize,

    /// Number of selected-control combinations to permute when unpaired
    #[arg(long, default_value = "1")]
    combinations: usize,

    /// File with genomic regions to mask (scaffold, begin, end)
    #[arg(long)]
    masking_file: Option<PathBuf>,

    /// Seed for the permutation random number generator
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Write per-site and per-window dump files
    #[arg(long)]
    verbose: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

macro_rules! progress {
    ($quiet:expr) => {
        if !$quiet {
            eprintln!();
        }
    };
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}

fn make_progress_bar(quiet: bool, len: u64) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("  [{elapsed_precise}/{eta_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb
}

fn settings_from(args: Args) -> Result<Settings> {
    RunOptions {
        vcf: args.vcf,
        outdir: args.outdir,
        selected_parent: args.selected_parent,
        control_parent: args.control_parent,
        major_parent: args.major_parent,
        haplodiploid: args.haplodiploid,
        selected_offspring: args.selected_offspring,
        control_offspring: args.control_offspring,
        mac: args.mac,
        coverage_over: args.coverage_over,
        coverage_under: args.coverage_under,
        qds: args.qds,
        sor: args.sor,
        mps: args.mps,
        mqrs: args.mqrs,
        rprs: args.rprs,
        binsize: args.binsize,
        window: args.window,
        slide: args.slide,
        min_allele: args.min_allele,
        min_scaffold: args.min_scaffold,
        perm: args.perm,
        sig: args.significance,
        unpaired: args.unpaired,
        threads: args.threads,
        combinations: args.combinations,
        masking_file: args.masking_file,
        seed: args.seed,
        verbose: args.verbose,
        quiet: args.quiet,
    }
    .resolve()
    .context("invalid run configuration")
}

fn main() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    if !args.vcf.exists() {
        anyhow::bail!("Input file not found: {}", args.vcf.display());
    }

    let settings = settings_from(args)?;

    // Configure rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.threads)
        .build_global()
        .unwrap();

    let info_dir = settings.info_dir();
    let output_dir = settings.output_dir();
    std::fs::create_dir_all(&info_dir)?;
    std::fs::create_dir_all(&output_dir)?;

    progress!(quiet, "BSA allele-frequency scan");
    progress!(quiet, "=========================================");
    progress!(quiet, "Input VCF: {}", settings.vcf.display());
    progress!(quiet, "Output directory: {}", settings.outdir.display());
    progress!(quiet, "Scoring design: {:?}", settings.design);
    progress!(quiet, "Window: {} bp, slide: {} bp", settings.window, settings.slide);
    progress!(quiet, "Minimum variants per window: {}", settings.min_allele);
    if settings.perm > 0 {
        progress!(quiet, "Permutations: {} per combination", settings.perm);
        progress!(quiet, "  Combinations: {}", settings.combinations);
        progress!(quiet, "  Significance: {}", settings.sig);
        progress!(quiet, "  Threads: {}", settings.threads);
    } else {
        progress!(quiet, "Permutation testing: disabled");
    }
    progress!(quiet);

    // Step 1: coverage baselines and the scaffold table
    progress!(quiet, "Step 1: Profiling coverage...");
    let (genome, cov) = coverage::profile(&settings)?;
    output::write_scaffold_table(&genome, &info_dir.join("chrom_file.txt"))?;
    let tracked = settings.tracked_samples();
    output::write_coverage_table(&tracked, &cov, &info_dir.join("coverageinfo.txt"))?;
    progress!(quiet, "  {} qualifying scaffolds, {} bp total", genome.len(), genome.end());

    // Step 2: filter and score variants
    progress!(quiet);
    progress!(quiet, "Step 2: Scoring variants...");
    let (index, _counts) = scan::scan_vcf(&settings, &genome, &cov)?;
    if settings.verbose {
        output::write_site_dump(&index, &genome, &settings.output_samples(), &info_dir)?;
    }

    // Step 3: sliding windows
    progress!(quiet);
    progress!(quiet, "Step 3: Sliding window analysis...");
    let windows = window::slide_windows(&settings, &genome, &index);
    for (sample, track) in windows.samples.iter().zip(windows.tracks.iter()) {
        progress!(quiet, "  {}: {} windows", sample, track.len());
        if settings.verbose {
            output::write_track(track, &output_dir.join(format!("{}.txt", sample)))?;
        }
    }

    // Step 4: align window grids
    progress!(quiet);
    progress!(quiet, "Step 4: Filling missing windows...");
    let filled = fill::fill_in(&settings, &genome, &windows)?;
    for (sample, track) in filled.samples.iter().zip(filled.tracks.iter()) {
        output::write_track(track, &output_dir.join(format!("{}_filled_in.txt", sample)))?;
    }

    // Step 5: permutation significance test
    progress!(quiet);
    progress!(quiet, "Step 5: Permutation testing...");
    let bar = make_progress_bar(
        quiet || settings.perm == 0,
        (settings.perm * settings.combinations) as u64,
    );
    let report = permutation::run(
        &settings,
        &filled,
        &output_dir.join("permutations.txt"),
        Some(&bar),
    )?;
    bar.finish_and_clear();

    output::write_pairs(
        &report.average.pos,
        &report.average.val,
        &output_dir.join("selected_average.txt"),
    )?;
    let min = report.average.val.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = report
        .average
        .val
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    progress!(quiet, "  Averaged difference signal: min {:.4}, max {:.4}", min, max);
    match report.cutoff {
        Some(cutoff) => progress!(quiet, "  Statistical cutoff: {:.6}", cutoff),
        None => progress!(quiet, "  No cutoff computed (permutations disabled)"),
    }

    progress!(quiet);
    progress!(quiet, "Done! Results written to: {}", output_dir.display());

    Ok(())
}
