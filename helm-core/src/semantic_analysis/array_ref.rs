use helm_asm::{Instr, ToConstInstr};
use helm_types::{Type, Val};

/// Where the cells of an array live relative to the start of the locals (or
/// fields) area: a compile-time constant, or instructions computing the
/// offset on the stack at runtime.
#[derive(Debug, Clone)]
pub(crate) enum ArrayOffset {
    Constant(usize),
    Runtime(Vec<Instr>),
}

impl ArrayOffset {
    pub(crate) fn add_constant(self, cells: usize) -> ArrayOffset {
        match self {
            ArrayOffset::Constant(base) => ArrayOffset::Constant(base + cells),
            ArrayOffset::Runtime(mut instrs) => {
                if cells > 0 {
                    instrs.push(Val::u256(cells as u64).to_const_instr());
                    instrs.push(Instr::U256Add);
                }
                ArrayOffset::Runtime(instrs)
            }
        }
    }

    /// Adds an offset computed at runtime; `code` must leave one `U256` on
    /// the stack.
    pub(crate) fn add_runtime(self, code: Vec<Instr>) -> ArrayOffset {
        match self {
            ArrayOffset::Constant(0) => ArrayOffset::Runtime(code),
            ArrayOffset::Constant(base) => {
                let mut instrs = vec![Val::u256(base as u64).to_const_instr()];
                instrs.extend(code);
                instrs.push(Instr::U256Add);
                ArrayOffset::Runtime(instrs)
            }
            ArrayOffset::Runtime(mut instrs) => {
                instrs.extend(code);
                instrs.push(Instr::U256Add);
                ArrayOffset::Runtime(instrs)
            }
        }
    }
}

/// A materialised array: a contiguous run of local or field cells starting at
/// `offset`, enabling per-element loads and stores as base + offset.
#[derive(Debug, Clone)]
pub(crate) struct ArrayRef {
    pub is_local: bool,
    pub is_mutable: bool,
    /// Always a `Type::FixedSizeArray`.
    pub tpe: Type,
    pub offset: ArrayOffset,
}

impl ArrayRef {
    pub(crate) fn flattened_length(&self) -> usize {
        self.tpe.flattened_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_offsets_fold() {
        let offset = ArrayOffset::Constant(2).add_constant(3);
        assert!(matches!(offset, ArrayOffset::Constant(5)));
    }

    #[test]
    fn runtime_offsets_accumulate_adds() {
        let offset = ArrayOffset::Constant(4).add_runtime(vec![Instr::LoadLocal(0)]);
        match offset {
            ArrayOffset::Runtime(instrs) => assert_eq!(
                instrs,
                vec![Instr::U256Const4, Instr::LoadLocal(0), Instr::U256Add]
            ),
            other => panic!("unexpected offset {:?}", other),
        }
    }

    #[test]
    fn zero_base_runtime_offset_has_no_add() {
        let offset = ArrayOffset::Constant(0).add_runtime(vec![Instr::LoadLocal(1)]);
        match offset {
            ArrayOffset::Runtime(instrs) => assert_eq!(instrs, vec![Instr::LoadLocal(1)]),
            other => panic!("unexpected offset {:?}", other),
        }
    }
}
