use crate::geometry;
use crate::piece::Piece;
use crate::point::Point;

/// The classical possible-position map: for every square, the piece that
/// would be there if every in-flight superposition resolved in its favor.
/// This is a bookkeeping structure, not a claim about certainty — see
/// invariant I1.
#[derive(Debug, Clone)]
pub struct Board {
    pub width: i32,
    pub height: i32,
    squares: Vec<Piece>,
}

impl Board {
    pub fn new(width: i32, height: i32) -> Self {
        Board {
            width,
            height,
            squares: vec![Piece::NULL; (width * height) as usize],
        }
    }

    pub fn in_bounds(&self, p: Point) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    /// Row-major qubit/classical-bit index for a point: `width * y + x`.
    pub fn idx(&self, p: Point) -> usize {
        (self.width * p.y + p.x) as usize
    }

    pub fn point_of(&self, index: usize) -> Point {
        let index = index as i32;
        Point::new(index % self.width, index / self.width)
    }

    pub fn get(&self, p: Point) -> Piece {
        self.squares[self.idx(p)]
    }

    pub fn set(&mut self, p: Point, piece: Piece) {
        let i = self.idx(p);
        self.squares[i] = piece;
    }

    pub fn is_occupied(&self, p: Point) -> bool {
        !self.get(p).is_null()
    }

    /// The strictly-interior squares between `source` and `target`.
    pub fn path_points(&self, source: Point, target: Point) -> Vec<Point> {
        geometry::path(source, target)
    }

    /// The pieces occupying the strictly-interior squares between `source`
    /// and `target`, in order. Empty squares are skipped.
    pub fn path_pieces(&self, source: Point, target: Point) -> Vec<(Point, Piece)> {
        self.path_points(source, target)
            .into_iter()
            .map(|p| (p, self.get(p)))
            .filter(|(_, piece)| !piece.is_null())
            .collect()
    }

    pub fn num_squares(&self) -> usize {
        self.squares.len()
    }

    /// All occupied squares, in row-major order.
    pub fn occupied_points(&self) -> Vec<Point> {
        (0..self.squares.len())
            .filter(|&i| !self.squares[i].is_null())
            .map(|i| self.point_of(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{Color, PieceType};

    #[test]
    fn idx_is_row_major() {
        let b = Board::new(3, 3);
        assert_eq!(b.idx(Point::new(0, 0)), 0);
        assert_eq!(b.idx(Point::new(2, 0)), 2);
        assert_eq!(b.idx(Point::new(0, 1)), 3);
    }

    #[test]
    fn point_of_is_idx_inverse() {
        let b = Board::new(4, 5);
        for y in 0..5 {
            for x in 0..4 {
                let p = Point::new(x, y);
                assert_eq!(b.point_of(b.idx(p)), p);
            }
        }
    }

    #[test]
    fn new_board_is_empty() {
        let b = Board::new(3, 3);
        assert!(b.occupied_points().is_empty());
    }

    #[test]
    fn set_and_get_roundtrip() {
        let mut b = Board::new(3, 3);
        let king = Piece::new(PieceType::King, Color::White);
        b.set(Point::new(1, 1), king);
        assert_eq!(b.get(Point::new(1, 1)), king);
        assert!(b.is_occupied(Point::new(1, 1)));
    }

    #[test]
    fn path_pieces_skips_empty_squares() {
        let mut b = Board::new(5, 1);
        let rook = Piece::new(PieceType::Rook, Color::White);
        b.set(Point::new(2, 0), rook);
        let pieces = b.path_pieces(Point::new(0, 0), Point::new(4, 0));
        assert_eq!(pieces, vec![(Point::new(2, 0), rook)]);
    }
}
