//! Minimal text-level VCF access: header scaffolds, sample columns, and
//! per-sample genotype/allele-depth fields. Only what the scan needs —
//! this is not a general VCF toolkit.

use crate::error::Result;
use flate2::read::MultiGzDecoder;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Number of fixed columns before the per-sample columns.
pub const SAMPLE_COLUMNS_START: usize = 9;

/// Open a VCF file, transparently decompressing `.gz` input.
pub fn open_vcf_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A scaffold declaration from a `##contig` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub length: u64,
}

/// Parse `##contig=<ID=...,length=...>`. Returns `None` for contig lines
/// without a length (real headers vary).
pub fn parse_contig_line(line: &str) -> Option<Contig> {
    let body = line
        .trim_end()
        .strip_prefix("##contig=<")?
        .strip_suffix('>')?;
    let mut name = None;
    let mut length = None;
    for field in body.split(',') {
        if let Some((key, value)) = field.split_once('=') {
            match key {
                "ID" => name = Some(value.to_string()),
                "length" => length = value.parse().ok(),
                _ => {}
            }
        }
    }
    Some(Contig {
        name: name?,
        length: length?,
    })
}

/// Sample names from the `#CHROM` header line, in column order.
pub fn parse_sample_header(line: &str) -> Vec<String> {
    line.trim_end()
        .split('\t')
        .skip(SAMPLE_COLUMNS_START)
        .map(str::to_string)
        .collect()
}

/// Normalize phased genotype separators so `|` and `/` read the same.
pub fn normalize_phase(line: &str) -> Cow<'_, str> {
    if line.contains('|') {
        Cow::Owned(line.replace('|', "/"))
    } else {
        Cow::Borrowed(line)
    }
}

/// The five site-quality annotations required for scoring.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteQuals {
    pub qd: Option<f64>,
    pub mq: Option<f64>,
    pub sor: Option<f64>,
    pub mq_rank_sum: Option<f64>,
    pub read_pos_rank_sum: Option<f64>,
}

impl SiteQuals {
    /// Scan an INFO field. Keys with non-numeric values are treated as
    /// absent; records missing any key are dropped by the caller.
    pub fn parse(info: &str) -> Self {
        let mut quals = SiteQuals::default();
        for entry in info.split(';') {
            if let Some((key, value)) = entry.split_once('=') {
                let parsed = value.parse().ok();
                match key {
                    "QD" => quals.qd = parsed,
                    "MQ" => quals.mq = parsed,
                    "SOR" => quals.sor = parsed,
                    "MQRankSum" => quals.mq_rank_sum = parsed,
                    "ReadPosRankSum" => quals.read_pos_rank_sum = parsed,
                    _ => {}
                }
            }
        }
        quals
    }
}

/// A tab-split VCF data line.
pub struct DataRow<'a> {
    fields: Vec<&'a str>,
}

impl<'a> DataRow<'a> {
    /// Split a data line. Header lines and truncated rows yield `None`.
    pub fn parse(line: &'a str) -> Option<DataRow<'a>> {
        if line.starts_with('#') {
            return None;
        }
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() <= SAMPLE_COLUMNS_START {
            return None;
        }
        Some(DataRow { fields })
    }

    pub fn chrom(&self) -> &'a str {
        self.fields[0]
    }

    pub fn pos(&self) -> Option<u64> {
        self.fields[1].parse().ok()
    }

    pub fn ref_allele(&self) -> &'a str {
        self.fields[3]
    }

    pub fn alt_allele(&self) -> &'a str {
        self.fields[4]
    }

    pub fn info(&self) -> &'a str {
        self.fields[7]
    }

    /// Single-nucleotide, biallelic.
    pub fn is_snp(&self) -> bool {
        self.ref_allele().len() == 1
            && self.alt_allele().len() == 1
            && self.alt_allele() != "."
    }

    pub fn sample_count(&self) -> usize {
        self.fields.len() - SAMPLE_COLUMNS_START
    }

    /// Truncated rows read as missing calls rather than indexing errors.
    pub fn sample(&self, column: usize) -> SampleCall<'a> {
        SampleCall(
            self.fields
                .get(SAMPLE_COLUMNS_START + column)
                .copied()
                .unwrap_or("."),
        )
    }
}

/// One sample's colon-delimited call field (`GT:AD:...`).
#[derive(Debug, Clone, Copy)]
pub struct SampleCall<'a>(pub &'a str);

impl<'a> SampleCall<'a> {
    pub fn genotype(&self) -> &'a str {
        self.0.split(':').next().unwrap_or("")
    }

    /// A call with any uncalled allele is missing.
    pub fn is_missing(&self) -> bool {
        let gt = self.genotype();
        gt.is_empty() || gt.split('/').any(|a| a == "." || a.is_empty())
    }

    /// Distinct called alleles, sorted.
    pub fn allele_set(&self) -> Option<Vec<u8>> {
        let mut alleles = self
            .genotype()
            .split('/')
            .map(|a| a.parse::<u8>().ok())
            .collect::<Option<Vec<u8>>>()?;
        alleles.sort_unstable();
        alleles.dedup();
        Some(alleles)
    }

    /// Comma-delimited allele depths from the second subfield.
    pub fn allele_depths(&self) -> Option<Vec<f64>> {
        self.0
            .split(':')
            .nth(1)?
            .split(',')
            .map(|v| v.parse::<f64>().ok())
            .collect()
    }

    /// Total read depth at the site (sum of allele depths).
    pub fn total_depth(&self) -> Option<f64> {
        Some(self.allele_depths()?.iter().sum())
    }

    /// Depth fraction supporting `allele`. Zero when the genotype does not
    /// carry the allele; `None` on malformed depths or zero total depth.
    pub fn fraction_of(&self, allele: u8) -> Option<f64> {
        let called = self.allele_set()?;
        if !called.contains(&allele) {
            return Some(0.0);
        }
        let depths = self.allele_depths()?;
        let total: f64 = depths.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(depths.get(allele as usize)? / total)
    }

    /// Depth fraction of the reference allele, read straight from the
    /// depths (no genotype membership check).
    pub fn ref_fraction(&self) -> Option<f64> {
        let depths = self.allele_depths()?;
        let total: f64 = depths.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(depths.first()? / total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_contig_line() {
        let contig = parse_contig_line("##contig=<ID=chr1,length=600000>").unwrap();
        assert_eq!(contig.name, "chr1");
        assert_eq!(contig.length, 600000);
    }

    #[test]
    fn test_parse_contig_line_extra_attributes() {
        let contig =
            parse_contig_line("##contig=<ID=scaffold_4,length=123456,assembly=asm1>").unwrap();
        assert_eq!(contig.name, "scaffold_4");
        assert_eq!(contig.length, 123456);
    }

    #[test]
    fn test_parse_contig_line_rejects_other_headers() {
        assert!(parse_contig_line("##fileformat=VCFv4.2").is_none());
        assert!(parse_contig_line("##contig=<ID=chrUn>").is_none());
    }

    #[test]
    fn test_sample_header() {
        let line = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tselA\tconA";
        assert_eq!(parse_sample_header(line), vec!["selA", "conA"]);
    }

    #[test]
    fn test_normalize_phase() {
        assert_eq!(normalize_phase("0|1:5,5"), "0/1:5,5");
        assert!(matches!(normalize_phase("0/1:5,5"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_site_quals() {
        let q = SiteQuals::parse("AC=2;QD=30.0;MQ=60.00;SOR=1.2;MQRankSum=0.0;ReadPosRankSum=-0.5");
        assert_relative_eq!(q.qd.unwrap(), 30.0);
        assert_relative_eq!(q.mq.unwrap(), 60.0);
        assert_relative_eq!(q.sor.unwrap(), 1.2);
        assert_relative_eq!(q.mq_rank_sum.unwrap(), 0.0);
        assert_relative_eq!(q.read_pos_rank_sum.unwrap(), -0.5);
    }

    #[test]
    fn test_site_quals_non_numeric_is_absent() {
        let q = SiteQuals::parse("QD=.;MQ=60.0");
        assert!(q.qd.is_none());
        assert!(q.mq.is_some());
        assert!(q.sor.is_none());
    }

    #[test]
    fn test_data_row() {
        let line = "chr1\t1000\t.\tA\tT\t99\tPASS\tQD=30\tGT:AD\t0/1:10,10\t0/0:20,0";
        let row = DataRow::parse(line).unwrap();
        assert_eq!(row.chrom(), "chr1");
        assert_eq!(row.pos(), Some(1000));
        assert!(row.is_snp());
        assert_eq!(row.sample_count(), 2);
        assert_eq!(row.sample(0).genotype(), "0/1");
    }

    #[test]
    fn test_data_row_rejects_header_and_short_lines() {
        assert!(DataRow::parse("#CHROM\tPOS").is_none());
        assert!(DataRow::parse("chr1\t1000\t.\tA\tT").is_none());
    }

    #[test]
    fn test_is_snp() {
        let indel = "chr1\t1\t.\tAT\tA\t99\tPASS\t.\tGT:AD\t0/1:5,5\t0/0:9,0";
        assert!(!DataRow::parse(indel).unwrap().is_snp());
        let multi = "chr1\t1\t.\tA\tT,G\t99\tPASS\t.\tGT:AD\t0/1:5,5\t0/0:9,0";
        assert!(!DataRow::parse(multi).unwrap().is_snp());
    }

    #[test]
    fn test_sample_call_missing() {
        assert!(SampleCall("./.:0,0").is_missing());
        assert!(SampleCall("1/.:3,4").is_missing());
        assert!(!SampleCall("0/1:10,10").is_missing());
        assert!(!SampleCall("1:0,12").is_missing());
    }

    #[test]
    fn test_allele_set_haploid() {
        assert_eq!(SampleCall("1:0,12").allele_set().unwrap(), vec![1]);
        assert_eq!(SampleCall("0/1:6,6").allele_set().unwrap(), vec![0, 1]);
        assert_eq!(SampleCall("1/1:0,12").allele_set().unwrap(), vec![1]);
    }

    #[test]
    fn test_fractions() {
        let call = SampleCall("0/1:15,5");
        assert_relative_eq!(call.total_depth().unwrap(), 20.0);
        assert_relative_eq!(call.fraction_of(0).unwrap(), 0.75);
        assert_relative_eq!(call.fraction_of(1).unwrap(), 0.25);
        assert_relative_eq!(call.ref_fraction().unwrap(), 0.75);
    }

    #[test]
    fn test_fraction_of_uncalled_allele_is_zero() {
        let call = SampleCall("0/0:20,3");
        assert_relative_eq!(call.fraction_of(1).unwrap(), 0.0);
    }

    #[test]
    fn test_fraction_zero_depth_unscorable() {
        assert!(SampleCall("0/1:0,0").fraction_of(0).is_none());
        assert!(SampleCall("0/1:0,0").ref_fraction().is_none());
    }
}
