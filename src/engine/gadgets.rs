//! Gate-level building blocks for the move engine, one function per move
//! shape (jump/slide standard/capture/split/merge/en-passant/castle).
//!
//! Every gadget uses the convention that a path-clear (or "condition true")
//! ancilla reads `|1>` when its condition holds — see DESIGN.md for why
//! this departs from the reference engine's own ancilla polarity while
//! producing identical move semantics.

use crate::quantum::{Gate, QuantumBackend};

fn mct_scratch(backend: &QuantumBackend) -> Vec<usize> {
    (0..crate::quantum::backend::MCT_ANCILLAS)
        .map(|i| backend.mct_ancilla(i))
        .collect()
}

/// Flip every path qubit, reset `ancilla` and mct it into "path clear"
/// (`1` iff every path qubit was originally `0`), leaving the path qubits
/// flipped. Caller must call [`uncompute_path_flip`] once done with the
/// ancilla's value.
fn compute_path_clear(backend: &mut QuantumBackend, path_qubits: &[usize], ancilla: usize) {
    for &q in path_qubits {
        backend.x(q);
    }
    backend.reset(ancilla);
    let scratch = mct_scratch(backend);
    backend.mct(path_qubits, ancilla, &scratch);
}

fn uncompute_path_flip(backend: &mut QuantumBackend, path_qubits: &[usize]) {
    for &q in path_qubits {
        backend.x(q);
    }
}

pub fn standard_jump(backend: &mut QuantumBackend, source: usize, target: usize) {
    backend.apply(Gate::ISwap, &[source, target]);
}

pub fn capture_jump(backend: &mut QuantumBackend, source: usize, target: usize) {
    let captured = backend.general_ancilla(0);
    backend.reset(captured);
    backend.apply(Gate::ISwap, &[target, captured]);
    backend.apply(Gate::ISwap, &[source, target]);
}

pub fn split_jump(backend: &mut QuantumBackend, source: usize, target1: usize, target2: usize) {
    backend.apply(Gate::SqrtISwap, &[target1, source]);
    backend.apply(Gate::ISwap, &[source, target2]);
}

pub fn merge_jump(backend: &mut QuantumBackend, source1: usize, source2: usize, target: usize) {
    backend.apply(Gate::ISwap, &[target, source2]);
    backend.apply(Gate::SqrtISwap, &[source1, target]);
}

/// Slide a piece along a (possibly empty) path, conditioned on the path
/// being clear; blocked branches leave the piece at `source`.
pub fn standard_slide(backend: &mut QuantumBackend, path_qubits: &[usize], source: usize, target: usize) {
    let ancilla = backend.general_ancilla(0);
    compute_path_clear(backend, path_qubits, ancilla);
    backend.apply(Gate::CISwap, &[source, target, ancilla]);
    uncompute_path_flip(backend, path_qubits);
}

/// Slide-capture gadget. The source piece must already be collapsed
/// before this is called (spec.md's precondition). Computes
/// `cond = path_clear OR (path_blocked AND target_empty)`, measures it
/// into `misc_cbit`, and if `cond == 1` performs the tentative capture
/// (move target's amplitude into a scratch ancilla, then move source into
/// target). Returns the measured `cond`.
pub fn capture_slide(
    backend: &mut QuantumBackend,
    path_qubits: &[usize],
    source: usize,
    target: usize,
    misc_cbit: usize,
) -> u8 {
    let path_ancilla = backend.general_ancilla(0);
    let cond_ancilla = backend.general_ancilla(1);
    let captured = backend.general_ancilla(2);

    compute_path_clear(backend, path_qubits, path_ancilla);

    backend.reset(cond_ancilla);
    backend.reset(captured);

    // cond = path_clear(path_ancilla) OR (blocked AND target_empty)
    backend.cx(path_ancilla, cond_ancilla);
    backend.x(path_ancilla);
    backend.x(target);
    backend.ccx(target, path_ancilla, cond_ancilla);
    backend.x(target);
    backend.x(path_ancilla);

    let cond = backend.measure(cond_ancilla, misc_cbit);

    if cond == 1 {
        backend.apply(Gate::ISwap, &[target, captured]);
        backend.apply(Gate::ISwap, &[source, target]);
    }

    uncompute_path_flip(backend, path_qubits);
    cond
}

/// Shared gadget for split (`is_split = true`) and merge (`is_split =
/// false`). `single` is the lone piece (source for split, target for
/// merge); `double1`/`double2` are the pair (the two split targets, or
/// the two merge sources).
#[allow(clippy::too_many_arguments)]
pub fn slide_split_merge(
    backend: &mut QuantumBackend,
    single: usize,
    double1: usize,
    double2: usize,
    path1_qubits: &[usize],
    path2_qubits: &[usize],
    is_split: bool,
) {
    let path_ancilla1 = backend.general_ancilla(0);
    compute_path_clear(backend, path1_qubits, path_ancilla1);
    uncompute_path_flip(backend, path1_qubits);

    let path_ancilla2 = backend.general_ancilla(1);
    compute_path_clear(backend, path2_qubits, path_ancilla2);
    uncompute_path_flip(backend, path2_qubits);

    let control = backend.general_ancilla(2);

    // both paths clear: true split/merge
    backend.reset(control);
    backend.ccx(path_ancilla1, path_ancilla2, control);
    if is_split {
        backend.apply(Gate::CSqrtISwap, &[double1, single, control]);
        backend.apply(Gate::CISwap, &[single, double2, control]);
    } else {
        backend.apply(Gate::CISwap, &[single, double2, control]);
        backend.apply(Gate::CSqrtISwap, &[double1, single, control]);
    }

    // path1 clear, path2 blocked: jump to/from double1 only
    backend.reset(control);
    backend.x(path_ancilla2);
    backend.ccx(path_ancilla1, path_ancilla2, control);
    backend.apply(Gate::CISwap, &[double1, single, control]);
    backend.x(path_ancilla2);

    // path2 clear, path1 blocked: jump to/from double2 only
    backend.reset(control);
    backend.x(path_ancilla1);
    backend.ccx(path_ancilla1, path_ancilla2, control);
    backend.apply(Gate::CISwap, &[single, double2, control]);
    backend.x(path_ancilla1);
}

pub fn split_slide(backend: &mut QuantumBackend, source: usize, target1: usize, target2: usize, path1: &[usize], path2: &[usize]) {
    slide_split_merge(backend, source, target1, target2, path1, path2, true);
}

pub fn merge_slide(backend: &mut QuantumBackend, source1: usize, source2: usize, target: usize, path1: &[usize], path2: &[usize]) {
    slide_split_merge(backend, target, source1, source2, path1, path2, false);
}

/// `both_pieces` ancilla reads `1` iff `source` and `ep_target` are *not*
/// both occupied (i.e. the en passant move is actually admissible at the
/// amplitude level).
pub fn standard_en_passant(backend: &mut QuantumBackend, source: usize, target: usize, ep_target: usize) {
    let captured = backend.general_ancilla(0);
    backend.reset(captured);

    let both_pieces = backend.general_ancilla(1);
    backend.reset(both_pieces);
    backend.ccx(source, ep_target, both_pieces);
    backend.x(both_pieces);

    backend.apply(Gate::CISwap, &[ep_target, captured, both_pieces]);
    backend.apply(Gate::CISwap, &[source, target, both_pieces]);
}

/// Variant used when the destination square is already known to be
/// occupied by something other than the ep-capturable pawn (`target` or
/// `ep_target` may hold a piece). Two capture ancillas are needed since
/// either — but never both — may hold a piece.
pub fn capture_en_passant(backend: &mut QuantumBackend, source: usize, target: usize, ep_target: usize) {
    let captured1 = backend.general_ancilla(0);
    backend.reset(captured1);
    let captured2 = backend.general_ancilla(1);
    backend.reset(captured2);

    let any_piece = backend.general_ancilla(2);
    backend.reset(any_piece);
    backend.cx(ep_target, any_piece);
    backend.cx(target, any_piece);
    backend.x(any_piece);

    backend.apply(Gate::CISwap, &[ep_target, captured1, any_piece]);
    backend.apply(Gate::CISwap, &[target, captured2, any_piece]);
    backend.apply(Gate::CISwap, &[source, target, any_piece]);
}

/// `path`, if given, holds every qubit that must be empty (excluding the
/// king/rook targets) for an unconditional castle to be safe; `None` means
/// the combined path is already known classically empty.
pub fn castle(
    backend: &mut QuantumBackend,
    king_source: usize,
    rook_source: usize,
    king_target: usize,
    rook_target: usize,
    path: Option<&[usize]>,
) {
    match path {
        None => {
            backend.apply(Gate::ISwap, &[king_source, king_target]);
            backend.apply(Gate::ISwap, &[rook_source, rook_target]);
        }
        Some(path_qubits) => {
            let ancilla = backend.general_ancilla(0);
            compute_path_clear(backend, path_qubits, ancilla);
            backend.apply(Gate::CISwap, &[king_source, king_target, ancilla]);
            backend.apply(Gate::CISwap, &[rook_source, rook_target, ancilla]);
            uncompute_path_flip(backend, path_qubits);
        }
    }
}
