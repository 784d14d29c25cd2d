//! Pointer-provenance tracking for AArch64 lowering.
//!
//! Each IR value carries a provenance fact: it is known to be a plain
//! integer, known to be a pointer, or unknown. Provenance flows through
//! arithmetic (`ptr + int` is a pointer, `int + int` an integer, and
//! `ptr - ptr` collapses back to an integer) and steers comparison
//! selection: comparisons involving pointer (or unknown) operands must use
//! a real `cmp` so the unsigned flag semantics that pointer comparisons
//! require are preserved, rather than any subtract-and-test shortcut.

use crate::ir::{DataFlowGraph, Function, Opcode, Value};

/// The provenance of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Known to be a plain integer.
    Integer,
    /// Known to be (derived from) a pointer.
    Pointer,
    /// Not known either way; treated as a pointer for comparison
    /// selection.
    Unknown,
}

impl Provenance {
    /// Merge two facts. Pointer dominates; unknown dominates integer.
    pub fn merge(self, other: Provenance) -> Provenance {
        use Provenance::*;
        match (self, other) {
            (Pointer, _) | (_, Pointer) => Pointer,
            (Unknown, _) | (_, Unknown) => Unknown,
            (Integer, Integer) => Integer,
        }
    }

    /// Must a comparison with an operand of this provenance use `cmp`?
    pub fn requires_cmp(self) -> bool {
        !matches!(self, Provenance::Integer)
    }
}

/// Per-function provenance facts, computed in one forward pass over the
/// layout order. Values defined by instructions not yet visited (back
/// edges) stay `Unknown`, which is the conservative direction.
pub struct FactFlowState {
    facts: Vec<Provenance>,
}

impl FactFlowState {
    /// Compute provenance facts for all values of `func`.
    pub fn compute(func: &Function) -> FactFlowState {
        let dfg = &func.dfg;
        let mut facts = vec![Provenance::Unknown; dfg.num_values()];

        // Block parameters: the type says it all up front.
        for block in &func.layout {
            for &param in dfg.block_params(*block) {
                facts[param.index()] = prov_from_ty(dfg, param);
            }
        }

        for block in &func.layout {
            for &inst in dfg.block_insts(*block) {
                let results = dfg.inst_results(inst);
                if results.is_empty() {
                    continue;
                }
                let fact = transfer(dfg, &facts, inst);
                for &result in results {
                    facts[result.index()] = fact;
                }
            }
        }
        FactFlowState { facts }
    }

    /// The provenance of a value.
    pub fn value_fact(&self, value: Value) -> Provenance {
        self.facts[value.index()]
    }

    /// Whether a comparison of the two values must be realized as a `cmp`
    /// instruction.
    pub fn comparison_requires_cmp(&self, lhs: Value, rhs: Value) -> bool {
        self.value_fact(lhs).requires_cmp() || self.value_fact(rhs).requires_cmp()
    }
}

fn prov_from_ty(dfg: &DataFlowGraph, value: Value) -> Provenance {
    if dfg.value_type(value).is_ref() {
        Provenance::Pointer
    } else {
        Provenance::Integer
    }
}

fn transfer(dfg: &DataFlowGraph, facts: &[Provenance], inst: crate::ir::Inst) -> Provenance {
    let data = dfg.inst_data(inst);
    // A value defined later in layout order (loop back edge) still holds
    // its initialized Unknown, which is the conservative answer.
    let arg_fact = |v: Value| facts[v.index()];
    match data.opcode() {
        Opcode::Iconst | Opcode::F32const | Opcode::F64const | Opcode::Vconst => {
            Provenance::Integer
        }
        Opcode::StackAddr | Opcode::SymbolValue => Provenance::Pointer,
        Opcode::Iadd => {
            let args = data.arguments();
            arg_fact(args[0]).merge(arg_fact(args[1]))
        }
        Opcode::Isub => {
            let args = data.arguments();
            match (arg_fact(args[0]), arg_fact(args[1])) {
                // ptr - ptr is an offset, an integer again.
                (Provenance::Pointer, Provenance::Pointer) => Provenance::Integer,
                (a, b) => a.merge(b),
            }
        }
        op if op.is_load() || op == Opcode::Load => {
            // Loaded data could be anything.
            Provenance::Unknown
        }
        Opcode::Icmp | Opcode::Fcmp => Provenance::Integer,
        _ => {
            // Every other pure computation preserves integer-ness of its
            // inputs; reference-typed results stay pointers.
            let results = dfg.inst_results(inst);
            if !results.is_empty() && dfg.value_type(results[0]).is_ref() {
                Provenance::Pointer
            } else {
                Provenance::Integer
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ALL: [Provenance; 3] = [Provenance::Integer, Provenance::Pointer, Provenance::Unknown];

    #[test]
    fn merge_laws() {
        // Commutative, associative, idempotent.
        for &a in &ALL {
            assert_eq!(a.merge(a), a);
            for &b in &ALL {
                assert_eq!(a.merge(b), b.merge(a));
                for &c in &ALL {
                    assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
                }
            }
        }
    }

    #[test]
    fn lattice_order() {
        assert_eq!(Provenance::Pointer.merge(Provenance::Unknown), Provenance::Pointer);
        assert_eq!(Provenance::Unknown.merge(Provenance::Integer), Provenance::Unknown);
        assert_eq!(Provenance::Integer.merge(Provenance::Integer), Provenance::Integer);
    }

    #[test]
    fn cmp_selection() {
        assert!(!Provenance::Integer.requires_cmp());
        assert!(Provenance::Pointer.requires_cmp());
        // Unknown is conservatively treated as pointer.
        assert!(Provenance::Unknown.requires_cmp());
    }
}
