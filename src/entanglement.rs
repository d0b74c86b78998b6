use log::debug;

use crate::board::Board;
use crate::piece::Piece;
use crate::point::Point;
use crate::quantum::QuantumBackend;

/// Bookkeeping for qflag equivalence classes: which pieces' amplitudes are
/// non-separable from each other, and the machinery to collapse a class
/// back down to a classical outcome.
#[derive(Clone)]
pub struct EntanglementTracker {
    qflag_counter: u32,
}

impl EntanglementTracker {
    pub fn new() -> Self {
        EntanglementTracker { qflag_counter: 0 }
    }

    /// Assign a fresh singleton qflag bit to a newly added piece.
    pub fn next_qflag(&mut self) -> u64 {
        assert!(
            self.qflag_counter < 63,
            "more than 63 live pieces would overflow the qflag bitmask"
        );
        let flag = 1u64 << self.qflag_counter;
        self.qflag_counter += 1;
        flag
    }

    /// Union the equivalence classes carrying `flag1` and `flag2`. A no-op
    /// if either flag is zero or the classes already intersect.
    pub fn entangle(&self, board: &mut Board, flag1: u64, flag2: u64) {
        if flag1 == 0 || flag2 == 0 || (flag1 & flag2) != 0 {
            return;
        }
        let union = flag1 | flag2;
        for p in board.occupied_points() {
            let mut piece = board.get(p);
            if piece.qflag & union != 0 {
                piece.qflag |= union;
                board.set(p, piece);
            }
        }
    }

    /// Union `flag` with the qflags of every piece on the open path between
    /// `source` and `target`. Returns whether the path held any pieces.
    pub fn entangle_path(&self, board: &mut Board, flag: u64, source: Point, target: Point) -> bool {
        let path_pieces = board.path_pieces(source, target);
        for (_, piece) in &path_pieces {
            self.entangle(board, flag, piece.qflag);
        }
        !path_pieces.is_empty()
    }

    /// Measure every occupied, not-yet-collapsed piece whose qflag
    /// intersects `mask` (or every occupied piece, if `collapse_all` is
    /// set), committing one joint sample. Surviving pieces get a fresh
    /// singleton qflag; if the whole board becomes collapsed, the circuit
    /// is reset and rebuilt from the deterministic classical state.
    pub fn collapse_by_flag(
        &mut self,
        board: &mut Board,
        backend: &mut QuantumBackend,
        mask: u64,
        collapse_all: bool,
    ) {
        let targets: Vec<Point> = board
            .occupied_points()
            .into_iter()
            .filter(|&p| {
                let piece = board.get(p);
                !piece.collapsed && (collapse_all || piece.qflag & mask != 0)
            })
            .collect();

        for p in &targets {
            let qubit = board.idx(*p);
            let cbit = qubit;
            let bit = backend.measure(qubit, cbit);
            backend.reset(qubit);
            if bit == 1 {
                backend.x(qubit);
                let mut piece = board.get(*p);
                piece.collapsed = true;
                piece.qflag = self.next_qflag();
                board.set(*p, piece);
            } else {
                board.set(*p, Piece::NULL);
            }
        }

        if !targets.is_empty() {
            debug!("collapsed {} square(s) under mask {:#x}", targets.len(), mask);
        }

        self.rebuild_if_fully_collapsed(board, backend);
    }

    pub fn collapse_point(&mut self, board: &mut Board, backend: &mut QuantumBackend, p: Point) {
        let flag = board.get(p).qflag;
        self.collapse_by_flag(board, backend, flag, false);
    }

    pub fn collapse_all(&mut self, board: &mut Board, backend: &mut QuantumBackend) {
        self.collapse_by_flag(board, backend, 0, true);
    }

    /// Every occupied square sharing a qflag bit with the piece at `p`,
    /// other than `p` itself.
    pub fn get_entangled(&self, board: &Board, p: Point) -> Vec<Point> {
        let flag = board.get(p).qflag;
        if flag == 0 {
            return Vec::new();
        }
        board
            .occupied_points()
            .into_iter()
            .filter(|&q| q != p && board.get(q).qflag & flag != 0)
            .collect()
    }

    fn rebuild_if_fully_collapsed(&mut self, board: &mut Board, backend: &mut QuantumBackend) {
        let occupied = board.occupied_points();
        if !occupied.is_empty() && occupied.iter().all(|&p| board.get(p).collapsed) {
            let mut bits = vec![0u8; board.num_squares()];
            for &p in &occupied {
                bits[board.idx(p)] = 1;
            }
            backend.rebuild_classical(&bits);

            self.qflag_counter = 0;
            for &p in &occupied {
                let mut piece = board.get(p);
                piece.qflag = self.next_qflag();
                board.set(p, piece);
            }
            debug!("board fully collapsed, circuit rebuilt from classical state");
        }
    }
}

impl Default for EntanglementTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{Color, PieceType};

    #[test]
    fn entangle_is_noop_on_zero_flags() {
        let mut board = Board::new(3, 3);
        let tracker = EntanglementTracker::new();
        let mut king = Piece::new(PieceType::King, Color::White);
        king.qflag = 1;
        board.set(Point::new(0, 0), king);
        tracker.entangle(&mut board, 0, 1);
        assert_eq!(board.get(Point::new(0, 0)).qflag, 1);
    }

    #[test]
    fn entangle_unions_classes() {
        let mut board = Board::new(3, 3);
        let tracker = EntanglementTracker::new();
        let mut a = Piece::new(PieceType::King, Color::White);
        a.qflag = 1;
        a.collapsed = false;
        let mut b = Piece::new(PieceType::King, Color::Black);
        b.qflag = 2;
        b.collapsed = false;
        board.set(Point::new(0, 0), a);
        board.set(Point::new(1, 1), b);
        tracker.entangle(&mut board, 1, 2);
        assert_eq!(board.get(Point::new(0, 0)).qflag, 3);
        assert_eq!(board.get(Point::new(1, 1)).qflag, 3);
    }

    #[test]
    fn collapse_all_on_classical_board_is_idempotent() {
        let mut board = Board::new(3, 3);
        let mut backend = QuantumBackend::alloc_seeded(3, 3, 42);
        let mut tracker = EntanglementTracker::new();

        let mut king = Piece::new(PieceType::King, Color::White);
        king.qflag = tracker.next_qflag();
        king.collapsed = true; // nothing in flight, collapse_all should no-op
        board.set(Point::new(0, 0), king);
        backend.x(board.idx(Point::new(0, 0)));

        tracker.collapse_all(&mut board, &mut backend);
        tracker.collapse_all(&mut board, &mut backend);
        assert!(board.get(Point::new(0, 0)).collapsed);
        assert_eq!(board.get(Point::new(0, 0)).piece_type, PieceType::King);
    }
}
