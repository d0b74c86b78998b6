//! The ASCII command shell: an out-of-core presenter and command parser
//! driving an [`crate::engine::Engine`]. Mirrors `QChess.ascii_render` /
//! `command_to_move_points` / `ascii_main_loop` in the reference
//! implementation. The engine itself never parses a command string or
//! prints a board — this module is a thin, replaceable consumer of its
//! public API (spec.md §1).

use crate::config::{square_from_algebraic, TutorialMoveType, TutorialStep};
use crate::engine::Engine;
use crate::errors::{CliError, CliResult};
use crate::piece::{Color, PieceType};
use crate::point::Point;

/// One of the three high-level move commands the algebraic grammar can
/// express (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Standard { source: Point, target: Point },
    Split { source: Point, target1: Point, target2: Point },
    Merge { source1: Point, source2: Point, target: Point },
}

/// Parse one line of the algebraic grammar:
/// `<sq><sq>` standard, `<sq>^<sq><sq>` split, `<sq><sq>^<sq>` merge,
/// where `<sq>` is a lowercase file letter followed by a 1-indexed rank
/// digit (`a1`..`z9`).
pub fn parse_command(input: &str, height: i32) -> CliResult<Command> {
    let command = input.trim();
    let bad = || CliError::BadCommand(input.to_string());
    let sq = |s: &str| -> CliResult<Point> { square_from_algebraic(s, height).ok_or_else(bad) };

    match command.len() {
        4 => Ok(Command::Standard {
            source: sq(&command[0..2])?,
            target: sq(&command[2..4])?,
        }),
        7 if command.as_bytes().get(2) == Some(&b'^') => Ok(Command::Split {
            source: sq(&command[0..2])?,
            target1: sq(&command[3..5])?,
            target2: sq(&command[5..7])?,
        }),
        7 if command.as_bytes().get(4) == Some(&b'^') => Ok(Command::Merge {
            source1: sq(&command[0..2])?,
            source2: sq(&command[2..4])?,
            target: sq(&command[5..7])?,
        }),
        _ => Err(bad()),
    }
}

/// Apply a parsed command to the engine, enforcing the `current_turn`
/// check the core engine intentionally omits (spec.md §1 non-goals: "no
/// turn-order enforcement" belongs to the presenter, not the core).
pub fn apply_command(
    engine: &mut Engine,
    command: &Command,
    current_turn: Color,
) -> CliResult<()> {
    let color_at = |engine: &Engine, p: Point| engine.get(p).color;
    let wrong_turn = || CliError::BadCommand(format!("it's {current_turn:?}'s turn to move"));

    match *command {
        Command::Standard { source, target } => {
            if color_at(engine, source) != current_turn {
                return Err(wrong_turn());
            }
            engine.standard(source, target, false)?;
        }
        Command::Split { source, target1, target2 } => {
            if color_at(engine, source) != current_turn {
                return Err(wrong_turn());
            }
            engine.split(source, target1, target2, false)?;
        }
        Command::Merge { source1, source2, target } => {
            if color_at(engine, source1) != current_turn || color_at(engine, source2) != current_turn
            {
                return Err(wrong_turn());
            }
            engine.merge(source1, source2, target, false)?;
        }
    }
    engine.end_of_ply();
    Ok(())
}

/// `PieceType` spelled the way tutorial JSON names it (`"Pawn"`, `"King"`,
/// ...), matching `PieceType.name` lookups in `tutorial_qchess.py`.
fn piece_type_from_name(name: &str) -> Option<PieceType> {
    match name {
        "None" => Some(PieceType::None),
        "Pawn" => Some(PieceType::Pawn),
        "Knight" => Some(PieceType::Knight),
        "Bishop" => Some(PieceType::Bishop),
        "Rook" => Some(PieceType::Rook),
        "Queen" => Some(PieceType::Queen),
        "King" => Some(PieceType::King),
        _ => None,
    }
}

/// Whether `command`, about to be applied to `engine`'s current board,
/// satisfies `step`'s `valid_moves` constraints (spec.md §6). A step with no
/// `valid_moves` accepts any move; each present constraint field is a list
/// of acceptable values and the move must match all of them. Piece-type and
/// square checks read the board *before* the move executes, matching
/// `TutorialQChess.standard_move`/`split_move`/`merge_move`.
pub fn tutorial_accepts(step: &TutorialStep, command: &Command, engine: &Engine, height: i32) -> bool {
    let constraints = match &step.valid_moves {
        Some(c) => c,
        None => return true,
    };

    let square_in = |list: &Option<Vec<String>>, p: Point| match list {
        None => true,
        Some(names) => names.iter().any(|n| square_from_algebraic(n, height) == Some(p)),
    };
    let piece_type_in = |list: &Option<Vec<String>>, t: PieceType| match list {
        None => true,
        Some(names) => names.iter().any(|n| piece_type_from_name(n) == Some(t)),
    };
    let move_type_in = |list: &Option<Vec<TutorialMoveType>>, mt: TutorialMoveType| match list {
        None => true,
        Some(types) => types.contains(&mt),
    };

    match *command {
        Command::Standard { source, target } => {
            piece_type_in(&constraints.source_piece_type, engine.get(source).piece_type)
                && piece_type_in(&constraints.target_piece_type, engine.get(target).piece_type)
                && move_type_in(&constraints.move_type, TutorialMoveType::Standard)
                && square_in(&constraints.source, source)
                && square_in(&constraints.target, target)
        }
        Command::Split { source, target1, target2 } => {
            piece_type_in(&constraints.source_piece_type, engine.get(source).piece_type)
                && piece_type_in(&constraints.target_piece_type, engine.get(target1).piece_type)
                && piece_type_in(&constraints.target_piece_type, engine.get(target2).piece_type)
                && move_type_in(&constraints.move_type, TutorialMoveType::Split)
                && square_in(&constraints.source, source)
                && square_in(&constraints.target1, target1)
                && square_in(&constraints.target2, target2)
        }
        Command::Merge { source1, source2, target } => {
            piece_type_in(&constraints.source_piece_type, engine.get(source1).piece_type)
                && piece_type_in(&constraints.source_piece_type, engine.get(source2).piece_type)
                && piece_type_in(&constraints.target_piece_type, engine.get(target).piece_type)
                && move_type_in(&constraints.move_type, TutorialMoveType::Merge)
                && square_in(&constraints.source1, source1)
                && square_in(&constraints.source2, source2)
                && square_in(&constraints.target, target)
        }
    }
}

/// Whether `step` permits a manual `collapse_all` in place of a move.
pub fn tutorial_allows_collapse(step: &TutorialStep) -> bool {
    step.valid_moves.as_ref().map(|c| c.collapse).unwrap_or(false)
}

/// Render the classical possible-position board as a grid of notation
/// characters, matching `QChess.ascii_render`.
pub fn ascii_render(engine: &Engine) -> String {
    let mut s = String::new();
    for y in 0..engine.board.height {
        for x in 0..engine.board.width {
            let piece = engine.get(Point::new(x, y));
            s.push(piece.as_notation());
            s.push(' ');
        }
        s.push('\n');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{Piece, PieceType};

    #[test]
    fn parses_standard_move() {
        let cmd = parse_command("a2a3", 8).unwrap();
        assert_eq!(
            cmd,
            Command::Standard {
                source: Point::new(0, 6),
                target: Point::new(0, 5),
            }
        );
    }

    #[test]
    fn parses_split_move() {
        let cmd = parse_command("a2^b3b4", 8).unwrap();
        assert_eq!(
            cmd,
            Command::Split {
                source: Point::new(0, 6),
                target1: Point::new(1, 5),
                target2: Point::new(1, 4),
            }
        );
    }

    #[test]
    fn parses_merge_move() {
        let cmd = parse_command("a2b2^a3", 8).unwrap();
        assert_eq!(
            cmd,
            Command::Merge {
                source1: Point::new(0, 6),
                source2: Point::new(1, 6),
                target: Point::new(0, 5),
            }
        );
    }

    #[test]
    fn rejects_malformed_command() {
        assert!(parse_command("nonsense", 8).is_err());
        assert!(parse_command("", 8).is_err());
    }

    #[test]
    fn apply_command_rejects_wrong_turn() {
        let mut engine = Engine::new(3, 3);
        engine.add_piece(Point::new(0, 0), Piece::new(PieceType::King, Color::Black));
        let cmd = Command::Standard {
            source: Point::new(0, 0),
            target: Point::new(1, 1),
        };
        let err = apply_command(&mut engine, &cmd, Color::White).unwrap_err();
        assert!(matches!(err, CliError::BadCommand(_)));
    }

    #[test]
    fn ascii_render_shows_placed_pieces() {
        let mut engine = Engine::new(2, 1);
        engine.add_piece(Point::new(0, 0), Piece::new(PieceType::King, Color::White));
        assert_eq!(ascii_render(&engine), "K 0 \n");
    }

    #[test]
    fn tutorial_step_with_no_constraints_accepts_anything() {
        let step: TutorialStep = serde_json::from_str(r#"{"message": ["go"]}"#).unwrap();
        let engine = Engine::new(3, 3);
        let cmd = Command::Standard { source: Point::new(0, 0), target: Point::new(1, 1) };
        assert!(tutorial_accepts(&step, &cmd, &engine, 3));
        assert!(!tutorial_allows_collapse(&step));
    }

    #[test]
    fn tutorial_step_rejects_wrong_piece_type() {
        let step: TutorialStep = serde_json::from_str(
            r#"{"message": ["go"], "valid_moves": {"source_piece_type": ["Queen"]}}"#,
        )
        .unwrap();
        let mut engine = Engine::new(3, 3);
        engine.add_piece(Point::new(0, 0), Piece::new(PieceType::King, Color::White));
        let cmd = Command::Standard { source: Point::new(0, 0), target: Point::new(1, 1) };
        assert!(!tutorial_accepts(&step, &cmd, &engine, 3));
    }

    #[test]
    fn tutorial_step_accepts_matching_move_type_and_square() {
        let step: TutorialStep = serde_json::from_str(
            r#"{"message": ["go"], "valid_moves": {"move_type": ["Standard"], "source": ["a3"]}}"#,
        )
        .unwrap();
        let engine = Engine::new(3, 3);
        let cmd = Command::Standard { source: Point::new(0, 0), target: Point::new(1, 1) };
        assert!(tutorial_accepts(&step, &cmd, &engine, 3));

        let wrong_shape = Command::Split {
            source: Point::new(0, 0),
            target1: Point::new(1, 1),
            target2: Point::new(0, 1),
        };
        assert!(!tutorial_accepts(&step, &wrong_shape, &engine, 3));
    }

    #[test]
    fn tutorial_step_collapse_flag_is_read() {
        let step: TutorialStep = serde_json::from_str(
            r#"{"message": ["go"], "valid_moves": {"collapse": true}}"#,
        )
        .unwrap();
        assert!(tutorial_allows_collapse(&step));
    }
}
