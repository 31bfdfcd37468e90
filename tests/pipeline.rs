//! End-to-end runs over synthetic VCFs: coverage profiling through
//! permutation testing.

use approx::assert_relative_eq;
use bsa_scan::config::{RunOptions, Settings};
use bsa_scan::{coverage, fill, permutation, scan, window};
use std::io::Write;
use std::path::PathBuf;

const QUALS: &str = "QD=30.0;MQ=60.0;SOR=1.0;MQRankSum=0.0;ReadPosRankSum=0.0";

struct TestVcf {
    _dir: tempfile::TempDir,
    path: PathBuf,
    outdir: PathBuf,
}

/// Two scaffolds above the length floor and one below, one SNP every
/// 1000 bp, every record passing the quality filters.
fn four_role_vcf(samples: &[&str], genotypes: &[&str]) -> TestVcf {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cross.vcf");
    let mut file = std::fs::File::create(&path).unwrap();

    writeln!(file, "##fileformat=VCFv4.2").unwrap();
    writeln!(file, "##contig=<ID=chr1,length=600000>").unwrap();
    writeln!(file, "##contig=<ID=chr2,length=800000>").unwrap();
    writeln!(file, "##contig=<ID=scrap,length=400000>").unwrap();
    writeln!(
        file,
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{}",
        samples.join("\t")
    )
    .unwrap();
    let calls = genotypes.join("\t");
    for (chrom, length) in [("chr1", 600_000u64), ("chr2", 800_000), ("scrap", 400_000)] {
        let mut pos = 1_000;
        while pos <= length {
            writeln!(
                file,
                "{}\t{}\t.\tA\tT\t99\tPASS\t{}\tGT:AD\t{}",
                chrom, pos, QUALS, calls
            )
            .unwrap();
            pos += 1_000;
        }
    }

    let outdir = dir.path().join("out");
    std::fs::create_dir_all(outdir.join("BSA_output")).unwrap();
    TestVcf {
        path,
        outdir,
        _dir: dir,
    }
}

fn four_role_settings(vcf: &TestVcf) -> Settings {
    RunOptions {
        vcf: vcf.path.clone(),
        outdir: vcf.outdir.clone(),
        selected_offspring: vec!["osel".into()],
        control_offspring: vec!["ocon".into()],
        selected_parent: vec!["psel".into()],
        control_parent: vec!["pcon".into()],
        min_allele: Some(5.0),
        perm: 200,
        seed: 42,
        quiet: true,
        ..RunOptions::default()
    }
    .resolve()
    .unwrap()
}

#[test]
fn dense_four_role_cross_end_to_end() {
    let vcf = four_role_vcf(
        &["osel", "ocon", "psel", "pcon"],
        &["0/1:12,8", "0/1:8,12", "0/0:20,0", "1/1:0,20"],
    );
    let settings = four_role_settings(&vcf);

    // coverage: every sample has a positive baseline of 20x
    let (genome, cov) = coverage::profile(&settings).unwrap();
    assert_eq!(genome.len(), 2); // the 400 kb scaffold is below the floor
    for sample in settings.tracked_samples() {
        assert_relative_eq!(cov.get(&sample).unwrap(), 20.0);
    }

    // scoring retains every SNP on the qualifying scaffolds
    let (index, counts) = scan::scan_vcf(&settings, &genome, &cov).unwrap();
    assert_eq!(counts.seen, 600 + 800);
    assert_eq!(counts.quality, counts.seen);
    assert_eq!(counts.scored, counts.seen);
    for si in 0..genome.len() {
        for site in index.sites(si) {
            for &(_, score) in &site.scores {
                assert!((0.0..=1.0).contains(&score));
            }
        }
    }

    // one window roughly every slide step, minus edge-truncated starts
    let windows = window::slide_windows(&settings, &genome, &index);
    let per_scaffold_1 = 530_000 / 5_000 + 1;
    let per_scaffold_2 = 730_000 / 5_000 + 1;
    for track in &windows.tracks {
        assert_eq!(track.len(), per_scaffold_1 + per_scaffold_2);
        for pair in track.pos.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        for &n in &track.nvr {
            assert!(n >= 5);
        }
    }
    // offspring means reflect their fixed allele-depth ratios
    for v in &windows.track("osel").unwrap().val {
        assert_relative_eq!(*v, 0.6, epsilon = 1e-9);
    }
    for v in &windows.track("ocon").unwrap().val {
        assert_relative_eq!(*v, 0.4, epsilon = 1e-9);
    }

    // gap filling yields one shared grid, with the inter-scaffold gap and
    // both genome flanks interpolated
    let filled = fill::fill_in(&settings, &genome, &windows).unwrap();
    assert_eq!(filled.tracks[0].pos, filled.tracks[1].pos);
    assert!(filled.tracks[0].len() > windows.tracks[0].len());
    assert!(filled.tracks[0].nvr.contains(&-1));
    for pair in filled.tracks[0].pos.windows(2) {
        assert!(pair[1] > pair[0]);
    }

    // the difference signal is flat at 0.2, so every rotation reproduces
    // it and the cutoff equals the signal itself
    let results = vcf.outdir.join("BSA_output").join("permutations.txt");
    let report = permutation::run(&settings, &filled, &results, None).unwrap();
    for v in &report.average.val {
        assert_relative_eq!(*v, 0.2, epsilon = 1e-9);
    }
    assert_relative_eq!(report.cutoff.unwrap(), 0.2, epsilon = 1e-9);

    let text = std::fs::read_to_string(&results).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("osel,ocon\t"));
}

#[test]
fn masked_interval_never_scores() {
    let vcf = four_role_vcf(
        &["osel", "ocon", "psel", "pcon"],
        &["0/1:12,8", "0/1:8,12", "0/0:20,0", "1/1:0,20"],
    );
    let maskfile = vcf.outdir.join("mask.txt");
    std::fs::write(&maskfile, "chr1\t1000\t2000\n").unwrap();

    let mut settings = four_role_settings(&vcf);
    settings.masking_file = Some(maskfile);

    let (genome, cov) = coverage::profile(&settings).unwrap();
    let (index, counts) = scan::scan_vcf(&settings, &genome, &cov).unwrap();

    // two SNPs fall inside the closed interval on chr1
    assert_eq!(counts.quality, counts.seen - 2);
    let chr1 = genome.index_of("chr1").unwrap();
    for site in index.sites(chr1) {
        assert!(
            site.pos < 1_000 || site.pos > 2_000,
            "masked position {} was scored",
            site.pos
        );
    }
}

#[test]
fn duplicated_control_data_stays_one_deterministic_combination() {
    // two replicate pairings whose control columns carry identical data
    let vcf = four_role_vcf(
        &["s1", "s2", "c1", "c2", "psel", "pcon"],
        &[
            "0/1:12,8", "0/1:14,6", "0/1:8,12", "0/1:8,12", "0/0:20,0", "1/1:0,20",
        ],
    );
    let settings = RunOptions {
        vcf: vcf.path.clone(),
        outdir: vcf.outdir.clone(),
        selected_offspring: vec!["s1".into(), "s2".into()],
        control_offspring: vec!["c1".into(), "c2".into()],
        selected_parent: vec!["psel".into()],
        control_parent: vec!["pcon".into()],
        min_allele: Some(5.0),
        perm: 100,
        seed: 7,
        quiet: true,
        ..RunOptions::default()
    }
    .resolve()
    .unwrap();

    let (genome, cov) = coverage::profile(&settings).unwrap();
    let (index, _) = scan::scan_vcf(&settings, &genome, &cov).unwrap();
    let windows = window::slide_windows(&settings, &genome, &index);
    let filled = fill::fill_in(&settings, &genome, &windows).unwrap();

    let results = vcf.outdir.join("BSA_output").join("permutations.txt");
    let first = permutation::run(&settings, &filled, &results, None).unwrap();
    let text = std::fs::read_to_string(&results).unwrap();
    assert_eq!(text.lines().count(), 1, "paired design permutes one combination");

    let second = permutation::run(&settings, &filled, &results, None).unwrap();
    assert_relative_eq!(first.cutoff.unwrap(), second.cutoff.unwrap());
}
