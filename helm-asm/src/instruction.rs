use helm_types::{Address, Val, I256, U256};
use serde::{Deserialize, Serialize};

/// One VM opcode with its immediates. Branch offsets are relative to the
/// instruction following the branch and are signed; the compiler rejects any
/// branch whose magnitude does not fit a single byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    // Constants.
    BoolConst(bool),
    U256Const0,
    U256Const1,
    U256Const2,
    U256Const3,
    U256Const4,
    U256Const5,
    U256Const(U256),
    I256Const(I256),
    BytesConst(Vec<u8>),
    AddressConst(Address),

    // Arithmetic. Overflow semantics are the VM's concern.
    U256Add,
    U256Sub,
    U256Mul,
    U256Div,
    U256Mod,
    I256Add,
    I256Sub,
    I256Mul,
    I256Div,
    I256Mod,

    // Comparison.
    U256Lt,
    U256Le,
    U256Gt,
    U256Ge,
    I256Lt,
    I256Le,
    I256Gt,
    I256Ge,

    // Typed equality. There is deliberately no array equality opcode.
    BoolEq,
    BoolNeq,
    U256Eq,
    U256Neq,
    I256Eq,
    I256Neq,
    ByteVecEq,
    ByteVecNeq,
    AddressEq,
    AddressNeq,

    // Boolean logic.
    And,
    Or,
    Not,

    // Storage access.
    LoadLocal(u8),
    StoreLocal(u8),
    LoadField(u8),
    StoreField(u8),
    LoadImmField(u8),
    LoadTemplate(u8),
    LoadLocalByIndex,
    StoreLocalByIndex,
    LoadFieldByIndex,
    StoreFieldByIndex,
    LoadImmFieldByIndex,

    // Stack manipulation.
    Dup,
    Pop,

    // Control flow.
    Jump(i16),
    IfTrue(i16),
    IfFalse(i16),
    Return,

    // Calls.
    CallLocal(u8),
    CallExternal(u8),

    // Assets and permission.
    ApproveAlph,
    ApproveToken,
    TransferAlphFromSelf,
    TransferTokenFromSelf,
    TransferAlphToSelf,
    TransferTokenToSelf,
    DestroySelf,
    SelfAddress,
    CheckPermission,
    Panic,

    // Event logging; the variant consumes the event index plus the field
    // cells, so `Log1` is an event with no fields.
    Log1,
    Log2,
    Log3,
    Log4,
    Log5,
    Log6,
}

impl Instr {
    /// The log opcode consuming `total_cells` stack cells (event index
    /// included), or `None` beyond the supported arity.
    pub fn log(total_cells: usize) -> Option<Instr> {
        match total_cells {
            1 => Some(Instr::Log1),
            2 => Some(Instr::Log2),
            3 => Some(Instr::Log3),
            4 => Some(Instr::Log4),
            5 => Some(Instr::Log5),
            6 => Some(Instr::Log6),
            _ => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Instr::Jump(_) | Instr::IfTrue(_) | Instr::IfFalse(_))
    }

    pub fn branch_offset(&self) -> Option<i16> {
        match self {
            Instr::Jump(offset) | Instr::IfTrue(offset) | Instr::IfFalse(offset) => Some(*offset),
            _ => None,
        }
    }

    /// Net number of stack cells pushed minus popped, `None` for the opcodes
    /// whose effect depends on the enclosing method or call target.
    pub fn stack_delta(&self) -> Option<i32> {
        use Instr::*;
        let delta = match self {
            BoolConst(_) | U256Const0 | U256Const1 | U256Const2 | U256Const3 | U256Const4
            | U256Const5 | U256Const(_) | I256Const(_) | BytesConst(_) | AddressConst(_) => 1,

            U256Add | U256Sub | U256Mul | U256Div | U256Mod | I256Add | I256Sub | I256Mul
            | I256Div | I256Mod => -1,

            U256Lt | U256Le | U256Gt | U256Ge | I256Lt | I256Le | I256Gt | I256Ge => -1,

            BoolEq | BoolNeq | U256Eq | U256Neq | I256Eq | I256Neq | ByteVecEq | ByteVecNeq
            | AddressEq | AddressNeq => -1,

            And | Or => -1,
            Not => 0,

            LoadLocal(_) | LoadField(_) | LoadImmField(_) | LoadTemplate(_) => 1,
            StoreLocal(_) | StoreField(_) => -1,
            LoadLocalByIndex | LoadFieldByIndex | LoadImmFieldByIndex => 0,
            StoreLocalByIndex | StoreFieldByIndex => -2,

            Dup => 1,
            Pop => -1,

            Jump(_) => 0,
            IfTrue(_) | IfFalse(_) => -1,

            Return | CallLocal(_) | CallExternal(_) => return None,

            ApproveAlph => -2,
            ApproveToken => -3,
            TransferAlphFromSelf | TransferAlphToSelf => -2,
            TransferTokenFromSelf | TransferTokenToSelf => -3,
            DestroySelf => -1,
            SelfAddress => 1,
            CheckPermission => -1,
            Panic => 0,

            Log1 => -1,
            Log2 => -2,
            Log3 => -3,
            Log4 => -4,
            Log5 => -5,
            Log6 => -6,
        };
        Some(delta)
    }
}

/// Conversion of a constant value into the single opcode that loads it.
pub trait ToConstInstr {
    fn to_const_instr(&self) -> Instr;
}

impl ToConstInstr for Val {
    fn to_const_instr(&self) -> Instr {
        match self {
            Val::Bool(b) => Instr::BoolConst(*b),
            Val::U256(v) => {
                if *v == U256::from(0u64) {
                    Instr::U256Const0
                } else if *v == U256::from(1u64) {
                    Instr::U256Const1
                } else if *v == U256::from(2u64) {
                    Instr::U256Const2
                } else if *v == U256::from(3u64) {
                    Instr::U256Const3
                } else if *v == U256::from(4u64) {
                    Instr::U256Const4
                } else if *v == U256::from(5u64) {
                    Instr::U256Const5
                } else {
                    Instr::U256Const(*v)
                }
            }
            Val::I256(v) => Instr::I256Const(*v),
            Val::ByteVec(bytes) => Instr::BytesConst(bytes.clone()),
            Val::Address(address) => Instr::AddressConst(*address),
        }
    }
}
