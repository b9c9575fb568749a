// Persistent weight memory.
//
// One JSON file holds everything the learning loop tunes: the feature
// weights, the piece values, the piece-square tables, and the per-phase
// depth/time schedule. Loading is forgiving — a missing file, a parse
// error, or any weight outside the W_MAX bound resets the whole set to
// defaults. Saving clamps every weight into [-W_MAX, W_MAX].

use crate::engine::evaluation::{Evaluator, Feature, W_MAX};
use crate::engine::phase::{Phase, PhaseSchedule};
use chess::Piece;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ALL_PIECES: [Piece; 6] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
    Piece::King,
];

fn piece_name(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "pawn",
        Piece::Knight => "knight",
        Piece::Bishop => "bishop",
        Piece::Rook => "rook",
        Piece::Queen => "queen",
        Piece::King => "king",
    }
}

/// On-disk shape of the weight memory.
#[derive(Debug, Serialize, Deserialize)]
struct WeightFile {
    weights: BTreeMap<String, f32>,
    piece_values: BTreeMap<String, i32>,
    psqt: BTreeMap<String, Vec<i32>>,
    depth_by_phase: BTreeMap<String, u8>,
    time_ms_by_phase: BTreeMap<String, u64>,
}

/// Loads and saves the evaluator state and phase schedule.
pub struct WeightStore {
    path: PathBuf,
}

impl WeightStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored state, or defaults when the file is absent or bad.
    pub fn load(&self) -> (Evaluator, PhaseSchedule) {
        match self.try_load() {
            Ok(state) => state,
            Err(err) => {
                log::warn!(
                    "weight file {} unusable ({err}), starting from defaults",
                    self.path.display()
                );
                (Evaluator::default(), PhaseSchedule::default())
            }
        }
    }

    fn try_load(&self) -> Result<(Evaluator, PhaseSchedule), LoadError> {
        let text = fs::read_to_string(&self.path)?;
        let file: WeightFile = serde_json::from_str(&text)?;

        // One out-of-range weight poisons the whole set.
        for (name, weight) in &file.weights {
            if weight.abs() > W_MAX || !weight.is_finite() {
                return Err(LoadError::WeightOutOfRange(name.clone(), *weight));
            }
        }

        let mut evaluator = Evaluator::default();
        for feature in Feature::ALL {
            match file.weights.get(feature.name()) {
                Some(weight) => {
                    evaluator.set_enabled(feature, true);
                    evaluator.set_weight(feature, *weight);
                }
                // A feature absent from the mapping does not contribute.
                None => evaluator.set_enabled(feature, false),
            }
        }

        for piece in ALL_PIECES {
            if let Some(value) = file.piece_values.get(piece_name(piece)) {
                evaluator.set_piece_value(piece, *value);
            }
        }

        for piece in ALL_PIECES {
            if let Some(values) = file.psqt.get(piece_name(piece)) {
                if values.len() == 64 {
                    let mut table = [0i32; 64];
                    table.copy_from_slice(values);
                    evaluator.psqt_mut().set_table(piece, table);
                } else {
                    return Err(LoadError::BadPsqt(piece_name(piece)));
                }
            }
        }

        let mut schedule = PhaseSchedule::default();
        for phase in Phase::ALL {
            if let Some(depth) = file.depth_by_phase.get(phase.name()) {
                schedule.set_depth(phase, *depth);
            }
            if let Some(ms) = file.time_ms_by_phase.get(phase.name()) {
                schedule.set_time_ms(phase, *ms);
            }
        }

        Ok((evaluator, schedule))
    }

    /// Write the current state; weights are clamped on the way out.
    pub fn save(&self, evaluator: &Evaluator, schedule: &PhaseSchedule) -> io::Result<()> {
        let mut weights = BTreeMap::new();
        for feature in Feature::ALL {
            if evaluator.is_enabled(feature) {
                weights.insert(
                    feature.name().to_string(),
                    evaluator.weight(feature).clamp(-W_MAX, W_MAX),
                );
            }
        }

        let mut piece_values = BTreeMap::new();
        let mut psqt = BTreeMap::new();
        for piece in ALL_PIECES {
            piece_values.insert(piece_name(piece).to_string(), evaluator.piece_value(piece));
            psqt.insert(
                piece_name(piece).to_string(),
                evaluator.psqt().table(piece).to_vec(),
            );
        }

        let mut depth_by_phase = BTreeMap::new();
        let mut time_ms_by_phase = BTreeMap::new();
        for phase in Phase::ALL {
            depth_by_phase.insert(phase.name().to_string(), schedule.depth(phase));
            time_ms_by_phase.insert(phase.name().to_string(), schedule.time_ms(phase));
        }

        let file = WeightFile {
            weights,
            piece_values,
            psqt,
            depth_by_phase,
            time_ms_by_phase,
        };
        let text = serde_json::to_string_pretty(&file).map_err(io::Error::other)?;
        fs::write(&self.path, text)
    }
}

#[derive(Debug)]
enum LoadError {
    Io(io::Error),
    Parse(serde_json::Error),
    WeightOutOfRange(String, f32),
    BadPsqt(&'static str),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "{err}"),
            LoadError::Parse(err) => write!(f, "{err}"),
            LoadError::WeightOutOfRange(name, w) => {
                write!(f, "weight {name} = {w} exceeds the bound {W_MAX}")
            }
            LoadError::BadPsqt(piece) => write!(f, "{piece} table is not 64 entries"),
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Parse(err)
    }
}
