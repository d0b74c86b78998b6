use crate::piece::{Color, Piece, PieceType};
use crate::point::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PawnMoveType {
    Invalid,
    SingleStep,
    DoubleStep,
    Capture,
    EnPassant,
}

/// Validate a pawn move, returning the move's kind and, for en passant, the
/// point of the pawn being captured.
///
/// Forward direction is `-1` in `y` for White, `+1` for Black (White starts
/// at the high-`y` rows and advances toward `y = 0`). En passant is checked
/// before capture: a diagonal step onto an empty square that matches
/// `ep_pawn_point` is en passant even though the destination itself is
/// unoccupied.
#[allow(clippy::too_many_arguments)]
pub fn is_move_valid(
    pawn: &Piece,
    source: Point,
    target: Point,
    target_piece: Piece,
    ep_pawn_point: Option<Point>,
) -> (PawnMoveType, Option<Point>) {
    debug_assert_eq!(pawn.piece_type, PieceType::Pawn);

    if source == target {
        return (PawnMoveType::Invalid, None);
    }

    let dy: i32 = if pawn.color == Color::White { -1 } else { 1 };

    if target.x == source.x {
        if target.y == source.y + 2 * dy {
            if pawn.has_moved {
                (PawnMoveType::Invalid, None)
            } else {
                (PawnMoveType::DoubleStep, None)
            }
        } else if target.y == source.y + dy {
            (PawnMoveType::SingleStep, None)
        } else {
            (PawnMoveType::Invalid, None)
        }
    } else if (target.x == source.x + 1 || target.x == source.x - 1) && target.y == source.y + dy
    {
        let behind_target = Point::new(target.x, target.y - dy);
        if ep_pawn_point == Some(behind_target) {
            (PawnMoveType::EnPassant, Some(behind_target))
        } else if !target_piece.is_null() && target_piece.color != pawn.color {
            (PawnMoveType::Capture, None)
        } else {
            (PawnMoveType::Invalid, None)
        }
    } else {
        (PawnMoveType::Invalid, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_pawn(has_moved: bool) -> Piece {
        let mut p = Piece::new(PieceType::Pawn, Color::White);
        p.has_moved = has_moved;
        p
    }

    #[test]
    fn single_step_forward() {
        let pawn = white_pawn(false);
        let (mt, _) = is_move_valid(&pawn, Point::new(1, 6), Point::new(1, 5), Piece::NULL, None);
        assert_eq!(mt, PawnMoveType::SingleStep);
    }

    #[test]
    fn double_step_only_before_first_move() {
        let pawn = white_pawn(false);
        let (mt, _) = is_move_valid(&pawn, Point::new(1, 6), Point::new(1, 4), Piece::NULL, None);
        assert_eq!(mt, PawnMoveType::DoubleStep);

        let moved = white_pawn(true);
        let (mt2, _) = is_move_valid(&moved, Point::new(1, 6), Point::new(1, 4), Piece::NULL, None);
        assert_eq!(mt2, PawnMoveType::Invalid);
    }

    #[test]
    fn diagonal_capture_requires_opposite_color() {
        let pawn = white_pawn(true);
        let black = Piece::new(PieceType::Knight, Color::Black);
        let (mt, _) = is_move_valid(&pawn, Point::new(1, 6), Point::new(2, 5), black, None);
        assert_eq!(mt, PawnMoveType::Capture);

        let white = Piece::new(PieceType::Knight, Color::White);
        let (mt2, _) = is_move_valid(&pawn, Point::new(1, 6), Point::new(2, 5), white, None);
        assert_eq!(mt2, PawnMoveType::Invalid);
    }

    #[test]
    fn en_passant_takes_priority_over_invalid_empty_diagonal() {
        let pawn = white_pawn(true);
        let ep_point = Point::new(2, 5);
        let (mt, captured) = is_move_valid(
            &pawn,
            Point::new(1, 6),
            Point::new(2, 5),
            Piece::NULL,
            Some(ep_point),
        );
        assert_eq!(mt, PawnMoveType::EnPassant);
        assert_eq!(captured, Some(ep_point));
    }
}
