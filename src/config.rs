//! JSON game-mode and tutorial configuration, consumed by the CLI layer to
//! build an [`crate::engine::Engine`]. Out-of-core per spec.md §1: the
//! engine itself never reads a file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::piece::Color;
use crate::point::Point;

/// `"a1"` -> `Point`, per the reference engine's `string_to_point`: file is
/// a 0-indexed lowercase letter, rank is a 1-indexed digit counted from the
/// bottom of the board (so rank `1` is row `height - 1`). Returns `None`
/// for malformed input; callers separately check bounds.
pub fn square_from_algebraic(s: &str, height: i32) -> Option<Point> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0];
    let rank = bytes[1];
    if !(b'a'..=b'z').contains(&file) || !(b'1'..=b'9').contains(&rank) {
        return None;
    }
    let x = (file - b'a') as i32;
    let y = height - (rank - b'0') as i32;
    Some(Point::new(x, y))
}

/// One row of the board grid: `'0'` for empty, otherwise a piece notation
/// character (`K`/`Q`/`R`/`B`/`N`/`P`, upper case for White, lower for
/// Black), matching `Piece::as_notation`/`from_notation` in the reference
/// engine.
pub type BoardRow = String;

/// A single castling rule: the algebraic squares a king/rook pair starts
/// and ends at.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CastlingType {
    pub rook_start: String,
    pub rook_end: String,
    pub king_start: String,
    pub king_end: String,
}

/// A game-mode configuration file, e.g. `game_modes/micro_chess.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameModeConfig {
    pub board: Vec<BoardRow>,
    #[serde(default)]
    pub starting_color: Option<String>,
    #[serde(default = "default_true")]
    pub pawn_double_step_allowed: bool,
    #[serde(default)]
    pub castling_types: Vec<CastlingType>,
}

fn default_true() -> bool {
    true
}

impl GameModeConfig {
    /// Load and parse `game_modes/{name}.json` relative to the current
    /// directory, matching `main.py`'s `os.path.join('game_modes', name +
    /// '.json')` lookup.
    pub fn load(name: &str) -> Result<Self> {
        let path = format!("game_modes/{name}.json");
        Self::load_path(&path)
    }

    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read game mode file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse game mode file {}", path.display()))
    }

    pub fn starting_color(&self) -> Color {
        match self.starting_color.as_deref() {
            Some("Black") => Color::Black,
            _ => Color::White,
        }
    }

    pub fn height(&self) -> i32 {
        self.board.len() as i32
    }

    pub fn width(&self) -> i32 {
        self.board.first().map(|row| row.chars().count()).unwrap_or(0) as i32
    }

    pub fn algebraic_to_point(&self, s: &str) -> Option<Point> {
        square_from_algebraic(s, self.height())
    }
}

/// The constraint a tutorial step's accepted move must satisfy, matching
/// `TutorialQChess`'s per-step `valid_moves` dict: every field is a list of
/// acceptable values (a move matches a field iff its corresponding value is
/// a member), and an absent field imposes no constraint at all. `collapse`
/// additionally permits a manual measurement step in place of a move.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TutorialValidMove {
    #[serde(default)]
    pub source_piece_type: Option<Vec<String>>,
    #[serde(default)]
    pub target_piece_type: Option<Vec<String>>,
    #[serde(default)]
    pub move_type: Option<Vec<TutorialMoveType>>,
    #[serde(default)]
    pub source: Option<Vec<String>>,
    #[serde(default)]
    pub source1: Option<Vec<String>>,
    #[serde(default)]
    pub source2: Option<Vec<String>>,
    #[serde(default)]
    pub target: Option<Vec<String>>,
    #[serde(default)]
    pub target1: Option<Vec<String>>,
    #[serde(default)]
    pub target2: Option<Vec<String>>,
    /// Permits a manual `collapse_all` step instead of a move.
    #[serde(default)]
    pub collapse: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TutorialMoveType {
    Standard,
    Split,
    Merge,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TutorialStep {
    pub message: Vec<String>,
    #[serde(default)]
    pub valid_moves: Option<TutorialValidMove>,
}

impl TutorialStep {
    pub fn message_text(&self) -> String {
        self.message.join(" ")
    }
}

/// A tutorial configuration file, e.g. `tutorials/splitting.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TutorialConfig {
    pub initial_message: Vec<String>,
    pub tutorial_steps: Vec<TutorialStep>,
    /// The game mode this tutorial plays out on top of.
    #[serde(flatten)]
    pub game_mode: GameModeConfig,
}

impl TutorialConfig {
    pub fn load(name: &str) -> Result<Self> {
        let path = format!("tutorials/{name}.json");
        Self::load_path(&path)
    }

    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read tutorial file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse tutorial file {}", path.display()))
    }

    pub fn initial_message(&self) -> String {
        self.initial_message.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_game_mode() {
        let json = r#"{
            "board": ["k0r", "0K0"],
            "starting_color": "Black",
            "pawn_double_step_allowed": false
        }"#;
        let cfg: GameModeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.width(), 3);
        assert_eq!(cfg.height(), 2);
        assert_eq!(cfg.starting_color(), Color::Black);
        assert!(!cfg.pawn_double_step_allowed);
        assert!(cfg.castling_types.is_empty());
    }

    #[test]
    fn defaults_double_step_to_true_and_white() {
        let json = r#"{"board": ["K"]}"#;
        let cfg: GameModeConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.pawn_double_step_allowed);
        assert_eq!(cfg.starting_color(), Color::White);
    }

    #[test]
    fn algebraic_square_flips_rank() {
        // 8-row board: a1 is bottom-left -> (0, 7); a8 is top-left -> (0, 0).
        assert_eq!(square_from_algebraic("a1", 8), Some(Point::new(0, 7)));
        assert_eq!(square_from_algebraic("a8", 8), Some(Point::new(0, 0)));
        assert_eq!(square_from_algebraic("h1", 8), Some(Point::new(7, 7)));
        assert_eq!(square_from_algebraic("a0", 8), None);
        assert_eq!(square_from_algebraic("aa", 8), None);
        assert_eq!(square_from_algebraic("abc", 8), None);
    }

    #[test]
    fn parses_castling_types() {
        let json = r#"{
            "board": ["r000k00r"],
            "castling_types": [
                {"rook_start": "a1", "rook_end": "d1", "king_start": "e1", "king_end": "c1"}
            ]
        }"#;
        let cfg: GameModeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.castling_types.len(), 1);
        assert_eq!(cfg.castling_types[0].rook_start, "a1");
    }
}
