//! Per-site genotype scoring under the four cross designs.
//!
//! The model is chosen once from the configuration; replicate tuples are
//! resolved to VCF column indices and absolute coverage bounds up front, so
//! per-record dispatch is a plain match with no name lookups.

use crate::config::{CrossDesign, Settings};
use crate::coverage::CoverageProfile;
use crate::error::{BsaError, Result};
use crate::vcf::{DataRow, SampleCall};

/// One sample's place in a scoring tuple: its VCF column and the absolute
/// depth bounds derived from its coverage baseline.
#[derive(Debug, Clone)]
struct Member {
    column: usize,
    depth_lo: f64,
    depth_hi: f64,
}

impl Member {
    /// The call, if present and within the coverage envelope.
    fn usable<'a>(&self, row: &DataRow<'a>) -> Option<SampleCall<'a>> {
        let call = row.sample(self.column);
        if call.is_missing() {
            return None;
        }
        let depth = call.total_depth()?;
        if depth < self.depth_lo || depth > self.depth_hi {
            return None;
        }
        Some(call)
    }
}

#[derive(Debug, Clone)]
struct FourRoleTuple {
    offspring: Member,
    selected_parent: Member,
    control_parent: Member,
    out: usize,
}

#[derive(Debug, Clone)]
struct PairedReplicate {
    selected_offspring: Member,
    control_offspring: Member,
    selected_parent: Member,
    control_parent: Member,
    out_selected: usize,
    out_control: usize,
}

#[derive(Debug, Clone)]
struct MajorReplicate {
    selected_offspring: Member,
    control_offspring: Member,
    major_parent: Member,
    out_selected: usize,
    out_control: usize,
}

#[derive(Debug, Clone)]
struct OffspringPair {
    selected_offspring: Member,
    control_offspring: Member,
    out_selected: usize,
    out_control: usize,
}

#[derive(Debug)]
enum Model {
    FourRole(Vec<FourRoleTuple>),
    Haplodiploid {
        replicates: Vec<PairedReplicate>,
        hpd_in_selected: bool,
        hpd_in_control: bool,
    },
    MajorParent(Vec<MajorReplicate>),
    NoParent(Vec<OffspringPair>),
}

/// The run's single scoring model.
#[derive(Debug)]
pub struct Scorer {
    mac: f64,
    model: Model,
}

impl Scorer {
    /// Resolve the configured design against the VCF sample header and the
    /// coverage baselines.
    pub fn new(
        settings: &Settings,
        header_samples: &[String],
        coverage: &CoverageProfile,
    ) -> Result<Scorer> {
        let member = |name: &str| -> Result<Member> {
            let column = header_samples
                .iter()
                .position(|s| s == name)
                .ok_or_else(|| {
                    BsaError::configuration(format!(
                        "sample '{}' not found in VCF header",
                        name
                    ))
                })?;
            let baseline = coverage.get(name).ok_or_else(|| {
                BsaError::configuration(format!(
                    "no coverage baseline for sample '{}'",
                    name
                ))
            })?;
            Ok(Member {
                column,
                depth_lo: baseline * settings.coverage_under,
                depth_hi: baseline * settings.coverage_over,
            })
        };

        let outputs = settings.output_samples();
        let out_id = |name: &str| -> usize {
            outputs.iter().position(|s| s == name).expect("offspring sample")
        };

        let model = match settings.design {
            CrossDesign::FourRole => {
                let mut tuples = Vec::new();
                // every offspring pool is scored against its replicate's
                // parent pair, selected pools first
                for offspring_group in
                    [&settings.selected_offspring, &settings.control_offspring]
                {
                    for (rep, name) in offspring_group.iter().enumerate() {
                        tuples.push(FourRoleTuple {
                            offspring: member(name)?,
                            selected_parent: member(&settings.selected_parent[rep])?,
                            control_parent: member(&settings.control_parent[rep])?,
                            out: out_id(name),
                        });
                    }
                }
                Model::FourRole(tuples)
            }
            CrossDesign::Haplodiploid => {
                let hpd = settings.haplodiploid.as_deref().unwrap_or("");
                let mut replicates = Vec::new();
                for rep in 0..settings.replicates() {
                    replicates.push(PairedReplicate {
                        selected_offspring: member(&settings.selected_offspring[rep])?,
                        control_offspring: member(&settings.control_offspring[rep])?,
                        selected_parent: member(&settings.selected_parent[rep])?,
                        control_parent: member(&settings.control_parent[rep])?,
                        out_selected: out_id(&settings.selected_offspring[rep]),
                        out_control: out_id(&settings.control_offspring[rep]),
                    });
                }
                Model::Haplodiploid {
                    replicates,
                    hpd_in_selected: settings.selected_parent.iter().any(|s| s == hpd),
                    hpd_in_control: settings.control_parent.iter().any(|s| s == hpd),
                }
            }
            CrossDesign::MajorParent => {
                let mut replicates = Vec::new();
                for rep in 0..settings.replicates() {
                    replicates.push(MajorReplicate {
                        selected_offspring: member(&settings.selected_offspring[rep])?,
                        control_offspring: member(&settings.control_offspring[rep])?,
                        major_parent: member(&settings.major_parent[rep])?,
                        out_selected: out_id(&settings.selected_offspring[rep]),
                        out_control: out_id(&settings.control_offspring[rep]),
                    });
                }
                Model::MajorParent(replicates)
            }
            CrossDesign::NoParent => {
                let mut pairs = Vec::new();
                for rep in 0..settings.replicates() {
                    pairs.push(OffspringPair {
                        selected_offspring: member(&settings.selected_offspring[rep])?,
                        control_offspring: member(&settings.control_offspring[rep])?,
                        out_selected: out_id(&settings.selected_offspring[rep]),
                        out_control: out_id(&settings.control_offspring[rep]),
                    });
                }
                Model::NoParent(pairs)
            }
        };

        Ok(Scorer {
            mac: settings.mac,
            model,
        })
    }

    /// Score one qualifying record. An empty result means no replicate
    /// tuple produced a usable score; the record is dropped silently.
    pub fn score(&self, row: &DataRow) -> Vec<(usize, f64)> {
        let mut out: Vec<(usize, f64)> = Vec::new();
        let mut push = |id: usize, score: f64| {
            // a name repeated across tuples keeps the last score, like a
            // map insert
            match out.iter_mut().find(|(existing, _)| *existing == id) {
                Some(entry) => entry.1 = score,
                None => out.push((id, score)),
            }
        };

        match &self.model {
            Model::FourRole(tuples) => {
                for tuple in tuples {
                    let Some(offspring) = tuple.offspring.usable(row) else {
                        continue;
                    };
                    let Some(sel) = tuple.selected_parent.usable(row) else {
                        continue;
                    };
                    let Some(con) = tuple.control_parent.usable(row) else {
                        continue;
                    };
                    let (Some(sel_alleles), Some(con_alleles)) =
                        (sel.allele_set(), con.allele_set())
                    else {
                        continue;
                    };
                    // both parents fixed, for different alleles
                    if sel_alleles.len() != 1
                        || con_alleles.len() != 1
                        || sel_alleles == con_alleles
                    {
                        continue;
                    }
                    if let Some(score) = offspring.fraction_of(sel_alleles[0]) {
                        push(tuple.out, score);
                    }
                }
            }
            Model::Haplodiploid {
                replicates,
                hpd_in_selected,
                hpd_in_control,
            } => {
                for rep in replicates {
                    let Some(off_sel) = rep.selected_offspring.usable(row) else {
                        continue;
                    };
                    let Some(off_con) = rep.control_offspring.usable(row) else {
                        continue;
                    };
                    let Some(sel) = rep.selected_parent.usable(row) else {
                        continue;
                    };
                    let Some(con) = rep.control_parent.usable(row) else {
                        continue;
                    };
                    let (Some(sel_alleles), Some(con_alleles)) =
                        (sel.allele_set(), con.allele_set())
                    else {
                        continue;
                    };
                    let mut union = sel_alleles.clone();
                    union.extend(&con_alleles);
                    union.sort_unstable();
                    union.dedup();
                    if union.len() != 2
                        || sel_alleles == con_alleles
                        || (sel_alleles.len() != 1 && con_alleles.len() != 1)
                    {
                        continue;
                    }

                    // the fixed parent anchors the expected allele; if that
                    // is the control side, the scores flip below
                    let (expected, complement, both_fixed) =
                        if sel_alleles.len() == 1 && con_alleles.len() == 1 {
                            (sel_alleles[0], false, true)
                        } else if sel_alleles.len() == 1 && *hpd_in_control {
                            (sel_alleles[0], false, false)
                        } else if con_alleles.len() == 1 && *hpd_in_selected {
                            (con_alleles[0], true, false)
                        } else {
                            continue;
                        };

                    let Some(score_sel) = off_sel.fraction_of(expected) else {
                        continue;
                    };
                    let Some(score_con) = off_con.fraction_of(expected) else {
                        continue;
                    };
                    // with only one parent fixed, a site where both pools
                    // look fixed too is uninformative
                    if !both_fixed && score_sel >= self.mac && score_con >= self.mac {
                        continue;
                    }
                    let (score_sel, score_con) = if complement {
                        (1.0 - score_sel, 1.0 - score_con)
                    } else {
                        (score_sel, score_con)
                    };
                    push(rep.out_selected, score_sel);
                    push(rep.out_control, score_con);
                }
            }
            Model::MajorParent(replicates) => {
                for rep in replicates {
                    let Some(off_sel) = rep.selected_offspring.usable(row) else {
                        continue;
                    };
                    let Some(off_con) = rep.control_offspring.usable(row) else {
                        continue;
                    };
                    let Some(major) = rep.major_parent.usable(row) else {
                        continue;
                    };
                    let Some(major_alleles) = major.allele_set() else {
                        continue;
                    };
                    if major_alleles.len() != 1 {
                        continue;
                    }
                    let Some(score_sel) = off_sel.fraction_of(major_alleles[0]) else {
                        continue;
                    };
                    let Some(score_con) = off_con.fraction_of(major_alleles[0]) else {
                        continue;
                    };
                    // both pools resembling the known parent is uninformative
                    if score_sel >= self.mac && score_con >= self.mac {
                        continue;
                    }
                    push(rep.out_selected, score_sel);
                    push(rep.out_control, score_con);
                }
            }
            Model::NoParent(pairs) => {
                for pair in pairs {
                    let Some(off_sel) = pair.selected_offspring.usable(row) else {
                        continue;
                    };
                    let Some(off_con) = pair.control_offspring.usable(row) else {
                        continue;
                    };
                    let Some(frac_sel) = off_sel.ref_fraction() else {
                        continue;
                    };
                    let Some(frac_con) = off_con.ref_fraction() else {
                        continue;
                    };
                    // reject only when both replicates are saturated on the
                    // same side
                    let both_high = frac_sel >= self.mac && frac_con >= self.mac;
                    let both_low =
                        frac_sel <= 1.0 - self.mac && frac_con <= 1.0 - self.mac;
                    if both_high || both_low {
                        continue;
                    }
                    push(pair.out_selected, (frac_sel - frac_con).abs());
                    push(pair.out_control, 0.0);
                }
            }
        }
        out
    }
}
