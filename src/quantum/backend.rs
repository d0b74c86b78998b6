use std::collections::HashMap;
use std::f64::consts::FRAC_1_SQRT_2;

use log::warn;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The number of general-purpose scratch ancillas a gadget may borrow
/// (capture/en-passant ancillas).
pub const GENERAL_ANCILLAS: usize = 3;
/// Scratch qubits reserved for multi-controlled-X decomposition.
pub const MCT_ANCILLAS: usize = 6;

/// One of the four named two/three-qubit unitaries this engine's gate set
/// is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// `|01> <-> i|10>`, `|00>`/`|11>` fixed.
    ISwap,
    /// `iSwap^(1/2)`: `|01> -> (|01> + i|10>)/sqrt(2)`, symmetric.
    SqrtISwap,
    /// iSwap on the first two qubits iff the third qubit is `|1>`.
    CISwap,
    /// `SqrtISwap` on the first two qubits iff the third qubit is `|1>`.
    CSqrtISwap,
}

/// An exact sparse-basis simulator for the fixed gate set this engine uses.
///
/// A dense statevector over `2^n` amplitudes is infeasible once `n` grows
/// past a few dozen qubits (a main register alone is `width * height`
/// qubits, plus nine ancillas). Every circuit this engine ever builds
/// starts from a computational-basis product state and is composed only
/// of X/CX/CCX/MCT and the four gates above, so the reachable state at any
/// point is a finite superposition over basis bitstrings — never a
/// generic dense vector. The backend stores only the nonzero amplitudes,
/// keyed by the bitstring packed into a `u128` (bit `i` is qubit `i`).
#[derive(Clone)]
pub struct QuantumBackend {
    num_main: usize,
    num_ancilla: usize,
    amplitudes: HashMap<u128, Complex64>,
    /// One classical bit per main qubit plus one auxiliary "misc" bit,
    /// matching the `width * height + 1` classical register of the
    /// reference circuit.
    classical: Vec<Option<u8>>,
    rng: StdRng,
}

impl QuantumBackend {
    /// Allocate a fresh backend for a `width * height` main register, with
    /// every qubit initialized to `|0>` and no measurements recorded yet.
    pub fn alloc(width: i32, height: i32) -> Self {
        Self::alloc_seeded(width, height, rand::random())
    }

    /// Deterministic constructor for tests: identical seed, identical
    /// sequence of measurement outcomes.
    pub fn alloc_seeded(width: i32, height: i32, seed: u64) -> Self {
        let num_main = (width * height) as usize;
        let mut amplitudes = HashMap::new();
        amplitudes.insert(0u128, Complex64::new(1.0, 0.0));
        QuantumBackend {
            num_main,
            num_ancilla: GENERAL_ANCILLAS + MCT_ANCILLAS,
            amplitudes,
            classical: vec![None; num_main + 1],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn num_main(&self) -> usize {
        self.num_main
    }

    pub fn num_qubits(&self) -> usize {
        self.num_main + self.num_ancilla
    }

    /// Index of the `i`-th general-purpose scratch ancilla.
    pub fn general_ancilla(&self, i: usize) -> usize {
        debug_assert!(i < GENERAL_ANCILLAS);
        self.num_main + i
    }

    /// Index of the `i`-th MCT decomposition scratch ancilla.
    pub fn mct_ancilla(&self, i: usize) -> usize {
        debug_assert!(i < MCT_ANCILLAS);
        self.num_main + GENERAL_ANCILLAS + i
    }

    /// The auxiliary classical bit (`cbit_misc`), used to carry the
    /// outcome of a gadget's internal condition qubit.
    pub fn misc_cbit(&self) -> usize {
        self.num_main
    }

    pub fn read_cbit(&self, cbit: usize) -> Option<u8> {
        self.classical[cbit]
    }

    pub fn x(&mut self, q: usize) {
        self.amplitudes = self
            .amplitudes
            .drain()
            .map(|(key, amp)| (key ^ (1u128 << q), amp))
            .collect();
    }

    pub fn cx(&mut self, control: usize, target: usize) {
        self.amplitudes = self
            .amplitudes
            .drain()
            .map(|(key, amp)| {
                let new_key = if (key >> control) & 1 == 1 {
                    key ^ (1u128 << target)
                } else {
                    key
                };
                (new_key, amp)
            })
            .collect();
    }

    pub fn ccx(&mut self, control1: usize, control2: usize, target: usize) {
        self.amplitudes = self
            .amplitudes
            .drain()
            .map(|(key, amp)| {
                let both = (key >> control1) & 1 == 1 && (key >> control2) & 1 == 1;
                let new_key = if both { key ^ (1u128 << target) } else { key };
                (new_key, amp)
            })
            .collect();
    }

    /// Multi-controlled NOT: flip `target` iff every qubit in `controls`
    /// is `|1>`. `scratch` is accepted only for interface parity with a
    /// hardware backend that would need it for decomposition; this exact
    /// simulator computes the result directly and asserts the scratch
    /// qubits are clean rather than mutating them.
    pub fn mct(&mut self, controls: &[usize], target: usize, scratch: &[usize]) {
        for &s in scratch {
            self.assert_clean(s);
        }
        self.amplitudes = self
            .amplitudes
            .drain()
            .map(|(key, amp)| {
                let all_set = controls.iter().all(|&c| (key >> c) & 1 == 1);
                let new_key = if all_set { key ^ (1u128 << target) } else { key };
                (new_key, amp)
            })
            .collect();
    }

    fn assert_clean(&self, q: usize) {
        let leaked: f64 = self
            .amplitudes
            .iter()
            .filter(|(key, _)| (*key >> q) & 1 == 1)
            .map(|(_, amp)| amp.norm_sqr())
            .sum();
        if leaked > 1e-9 {
            warn!("ancilla qubit {q} was not clean before use ({leaked:.3e} leaked population)");
        }
    }

    /// Force a qubit to `|0>`, exactly as a hardware reset channel would:
    /// measure it in the computational basis (discarding the outcome) and
    /// flip it back if it came up `|1>`. Unlike `measure`, this needs no
    /// pre-existing cleanliness — ancillas reused across gadgets are
    /// routinely left correlated with board state by a prior gadget (the
    /// split/merge path-clear ancillas are never uncomputed before the
    /// next call reclaims them), and tracing them out this way is exactly
    /// what the reference circuit's own `reset` instruction does.
    pub fn reset(&mut self, q: usize) {
        if self.measure_qubit(q) == 1 {
            self.x(q);
        }
    }

    /// Apply one of the four named unitaries to `qubits`. `ISwap` and
    /// `SqrtISwap` take exactly two qubits; `CISwap` and `CSqrtISwap` take
    /// three, the last being the control.
    pub fn apply(&mut self, gate: Gate, qubits: &[usize]) {
        match gate {
            Gate::ISwap => {
                assert_eq!(qubits.len(), 2, "ISwap takes exactly two qubits");
                apply_iswap_pair(&mut self.amplitudes, qubits[0], qubits[1], false);
            }
            Gate::SqrtISwap => {
                assert_eq!(qubits.len(), 2, "SqrtISwap takes exactly two qubits");
                apply_iswap_pair(&mut self.amplitudes, qubits[0], qubits[1], true);
            }
            Gate::CISwap => {
                assert_eq!(qubits.len(), 3, "CISwap takes exactly three qubits");
                apply_controlled_iswap(
                    &mut self.amplitudes,
                    qubits[0],
                    qubits[1],
                    qubits[2],
                    false,
                );
            }
            Gate::CSqrtISwap => {
                assert_eq!(qubits.len(), 3, "CSqrtISwap takes exactly three qubits");
                apply_controlled_iswap(
                    &mut self.amplitudes,
                    qubits[0],
                    qubits[1],
                    qubits[2],
                    true,
                );
            }
        }
    }

    /// Apply `gate` to `qubits` only if classical bit `cbit` was
    /// previously measured to `value`. Since every classical bit this
    /// engine reads was written by an earlier `measure` call in program
    /// order, this is a deterministic check rather than a true
    /// superposed branch.
    pub fn apply_conditional(&mut self, gate: Gate, qubits: &[usize], cbit: usize, value: u8) {
        if self.classical[cbit] == Some(value) {
            self.apply(gate, qubits);
        }
    }

    /// Collapse qubit `q`, recording the outcome in classical bit `cbit`.
    /// Returns the measured bit.
    pub fn measure(&mut self, q: usize, cbit: usize) -> u8 {
        let bit = self.measure_qubit(q);
        self.classical[cbit] = Some(bit);
        bit
    }

    fn measure_qubit(&mut self, q: usize) -> u8 {
        let p1: f64 = self
            .amplitudes
            .iter()
            .filter(|(key, _)| (*key >> q) & 1 == 1)
            .map(|(_, amp)| amp.norm_sqr())
            .sum();
        let p1 = p1.clamp(0.0, 1.0);
        let outcome = if self.rng.gen::<f64>() < p1 { 1u8 } else { 0u8 };

        let norm = if outcome == 1 { p1 } else { 1.0 - p1 };
        let scale = if norm > 1e-15 { norm.sqrt() } else { 1.0 };

        let mut rebuilt = HashMap::new();
        for (key, amp) in self.amplitudes.drain() {
            if ((key >> q) & 1) as u8 == outcome {
                rebuilt.insert(key, amp / scale);
            }
        }
        self.amplitudes = rebuilt;
        outcome
    }

    /// Measure every qubit (main and ancilla) in index order and return
    /// the full classical bitstring. This is the non-destructive
    /// read-everything primitive; it does not touch the per-square
    /// classical register used by `measure`.
    pub fn sample(&mut self) -> Vec<u8> {
        (0..self.num_qubits()).map(|q| self.measure_qubit(q)).collect()
    }

    /// Discard the circuit and rebuild it as a single deterministic
    /// computational-basis state matching `bits` (one bit per main
    /// qubit). Used after a full board collapse, bounding circuit depth
    /// for long games. Clears the classical register.
    pub fn rebuild_classical(&mut self, bits: &[u8]) {
        assert_eq!(bits.len(), self.num_main);
        let mut key: u128 = 0;
        for (i, &b) in bits.iter().enumerate() {
            if b == 1 {
                key |= 1u128 << i;
            }
        }
        self.amplitudes.clear();
        self.amplitudes.insert(key, Complex64::new(1.0, 0.0));
        self.classical = vec![None; self.num_main + 1];
    }

    #[cfg(test)]
    fn probability_of(&self, q: usize) -> f64 {
        self.amplitudes
            .iter()
            .filter(|(key, _)| (*key >> q) & 1 == 1)
            .map(|(_, amp)| amp.norm_sqr())
            .sum()
    }
}

fn apply_iswap_pair(map: &mut HashMap<u128, Complex64>, a: usize, b: usize, sqrt: bool) {
    let old = std::mem::take(map);
    let i = Complex64::new(0.0, 1.0);
    let inv_sqrt2 = Complex64::new(FRAC_1_SQRT_2, 0.0);
    let i_over_sqrt2 = Complex64::new(0.0, FRAC_1_SQRT_2);

    for (key, amp) in old {
        let bit_a = (key >> a) & 1;
        let bit_b = (key >> b) & 1;
        let base = key & !((1u128 << a) | (1u128 << b));
        let key_01 = base | (1u128 << b);
        let key_10 = base | (1u128 << a);

        match (bit_a, bit_b) {
            (0, 0) | (1, 1) => {
                *map.entry(key).or_insert(Complex64::new(0.0, 0.0)) += amp;
            }
            (0, 1) => {
                if sqrt {
                    *map.entry(key_01).or_insert(Complex64::new(0.0, 0.0)) += amp * inv_sqrt2;
                    *map.entry(key_10).or_insert(Complex64::new(0.0, 0.0)) += amp * i_over_sqrt2;
                } else {
                    *map.entry(key_10).or_insert(Complex64::new(0.0, 0.0)) += amp * i;
                }
            }
            (1, 0) => {
                if sqrt {
                    *map.entry(key_10).or_insert(Complex64::new(0.0, 0.0)) += amp * inv_sqrt2;
                    *map.entry(key_01).or_insert(Complex64::new(0.0, 0.0)) += amp * i_over_sqrt2;
                } else {
                    *map.entry(key_01).or_insert(Complex64::new(0.0, 0.0)) += amp * i;
                }
            }
            _ => unreachable!(),
        }
    }

    map.retain(|_, v| v.norm_sqr() > 1e-18);
}

fn apply_controlled_iswap(
    map: &mut HashMap<u128, Complex64>,
    a: usize,
    b: usize,
    control: usize,
    sqrt: bool,
) {
    let old = std::mem::take(map);
    let mut untouched = HashMap::with_capacity(old.len());
    let mut touched = HashMap::new();
    for (key, amp) in old {
        if (key >> control) & 1 == 1 {
            touched.insert(key, amp);
        } else {
            untouched.insert(key, amp);
        }
    }
    apply_iswap_pair(&mut touched, a, b, sqrt);
    for (key, amp) in touched {
        *untouched.entry(key).or_insert(Complex64::new(0.0, 0.0)) += amp;
    }
    *map = untouched;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iswap_swaps_01_and_10_with_i_phase() {
        let mut b = QuantumBackend::alloc_seeded(2, 1, 1);
        b.x(1); // qubit 1 = |1>, qubit 0 = |0> -> state |01> in (q0,q1) bit order: bit0=0,bit1=1
        b.apply(Gate::ISwap, &[0, 1]);
        assert!((b.probability_of(0) - 1.0).abs() < 1e-9);
        assert!(b.probability_of(1) < 1e-9);
    }

    #[test]
    fn sqrt_iswap_produces_even_superposition() {
        let mut b = QuantumBackend::alloc_seeded(2, 1, 2);
        b.x(1);
        b.apply(Gate::SqrtISwap, &[0, 1]);
        assert!((b.probability_of(0) - 0.5).abs() < 1e-9);
        assert!((b.probability_of(1) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn controlled_iswap_is_identity_when_control_is_zero() {
        let mut b = QuantumBackend::alloc_seeded(3, 1, 3);
        b.x(1); // qubit 1 = 1, control qubit 2 stays 0
        b.apply(Gate::CISwap, &[0, 1, 2]);
        assert!(b.probability_of(0) < 1e-9);
        assert!((b.probability_of(1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn controlled_iswap_fires_when_control_is_one() {
        let mut b = QuantumBackend::alloc_seeded(3, 1, 4);
        b.x(1);
        b.x(2); // control on
        b.apply(Gate::CISwap, &[0, 1, 2]);
        assert!((b.probability_of(0) - 1.0).abs() < 1e-9);
        assert!(b.probability_of(1) < 1e-9);
    }

    #[test]
    fn measure_collapses_to_a_definite_outcome() {
        let mut b = QuantumBackend::alloc_seeded(2, 1, 5);
        b.x(0);
        b.apply(Gate::SqrtISwap, &[0, 1]);
        let outcome = b.measure(0, 0);
        assert!(outcome == 0 || outcome == 1);
        // after measuring, probability of the measured qubit is exactly
        // the outcome (0 or 1), no leftover coherence.
        let p = b.probability_of(0);
        assert!((p - outcome as f64).abs() < 1e-9);
    }

    #[test]
    fn rebuild_classical_produces_a_product_state() {
        let mut b = QuantumBackend::alloc_seeded(2, 2, 6);
        b.x(0);
        b.x(3);
        b.rebuild_classical(&[1, 0, 0, 1]);
        assert!((b.probability_of(0) - 1.0).abs() < 1e-9);
        assert!(b.probability_of(1) < 1e-9);
        assert!(b.probability_of(2) < 1e-9);
        assert!((b.probability_of(3) - 1.0).abs() < 1e-9);
    }
}
