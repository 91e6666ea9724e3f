//! Current-stage resolution for assembly work in process.
//!
//! An in-process lot carries its quantity in exactly one of a block of
//! stage-quantity columns. The resolver scans the block left to right and takes
//! the first column holding a non-zero number as the lot's current stage.

use serde::{Deserialize, Serialize};

use super::extractor::column_letter;
use super::workbook::Cell;

/// What to do when more than one stage column qualifies for the same lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiStagePolicy {
    /// Leftmost qualifying column wins, nothing is reported.
    #[default]
    FirstMatch,
    /// Leftmost column still wins, and the lot is reported as an anomaly.
    FlagAnomaly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageResolution {
    /// Name of the winning stage, empty when no column qualified.
    pub stage: String,
    pub quantity: f64,
    /// Names of every qualifying stage, winner first.
    pub qualifying: Vec<String>,
}

impl StageResolution {
    pub fn is_ambiguous(&self) -> bool {
        self.qualifying.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct CurrentStageResolver {
    policy: MultiStagePolicy,
}

impl CurrentStageResolver {
    pub fn new(policy: MultiStagePolicy) -> Self {
        Self { policy }
    }

    /// `names[i]` labels `values[i]`. A missing or blank name is replaced by
    /// the block-relative column letter, so "" only ever means no column
    /// qualified.
    pub fn resolve(&self, names: &[String], values: &[Cell]) -> StageResolution {
        let mut hits = values.iter().enumerate().filter_map(|(i, cell)| {
            cell.to_number()
                .filter(|qty| *qty != 0.0)
                .map(|qty| (stage_label(names, i), qty))
        });

        let Some((stage, quantity)) = hits.next() else {
            return StageResolution {
                stage: String::new(),
                quantity: 0.0,
                qualifying: Vec::new(),
            };
        };

        let mut qualifying = vec![stage.clone()];
        if self.policy == MultiStagePolicy::FlagAnomaly {
            qualifying.extend(hits.map(|(name, _)| name));
        }

        StageResolution {
            stage,
            quantity,
            qualifying,
        }
    }
}

fn stage_label(names: &[String], index: usize) -> String {
    match names.get(index).map(|name| name.trim()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => column_letter(index),
    }
}

impl Default for CurrentStageResolver {
    fn default() -> Self {
        Self::new(MultiStagePolicy::default())
    }
}
