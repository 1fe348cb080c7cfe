use crate::TypeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The type language: five primitives, fixed-size arrays, and contract
/// handles. Array types flatten to `size * element-cells` stack cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    I256,
    U256,
    ByteVec,
    Address,
    FixedSizeArray { elem: Box<Type>, size: usize },
    Contract(TypeId),
}

impl Type {
    pub fn array(elem: Type, size: usize) -> Type {
        Type::FixedSizeArray {
            elem: Box::new(elem),
            size,
        }
    }

    /// Number of stack cells a value of this type occupies once arrays are
    /// fully expanded. Primitives and contract handles occupy one cell.
    pub fn flattened_length(&self) -> usize {
        match self {
            Type::FixedSizeArray { elem, size } => size * elem.flattened_length(),
            _ => 1,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::FixedSizeArray { .. })
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::I256 | Type::U256)
    }

    /// Peels `depth` array layers; `None` when a non-array is reached first.
    pub fn element_type(&self, depth: usize) -> Option<&Type> {
        let mut current = self;
        for _ in 0..depth {
            match current {
                Type::FixedSizeArray { elem, .. } => current = elem,
                _ => return None,
            }
        }
        Some(current)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "Bool"),
            Type::I256 => write!(f, "I256"),
            Type::U256 => write!(f, "U256"),
            Type::ByteVec => write!(f, "ByteVec"),
            Type::Address => write!(f, "Address"),
            Type::FixedSizeArray { elem, size } => write!(f, "[{}; {}]", elem, size),
            Type::Contract(id) => write!(f, "{}", id),
        }
    }
}

/// Total flattened cell count of a type sequence, e.g. a function's argument
/// list or return tuple.
pub fn flattened_types_length(types: &[Type]) -> usize {
    types.iter().map(Type::flattened_length).sum()
}

/// Renders a type sequence for error messages.
pub fn format_types(types: &[Type]) -> String {
    let parts: Vec<String> = types.iter().map(Type::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// The kind of a top-level declaration, carrying its two capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    Contract,
    AbstractContract,
    Interface,
    TxScript,
    AssetScript,
}

impl ContractKind {
    /// Whether a byte-vector address may be converted into a handle of this
    /// kind at runtime.
    pub fn is_instantiable(&self) -> bool {
        matches!(self, ContractKind::Contract | ContractKind::Interface)
    }

    /// Whether other declarations may inherit from this kind.
    pub fn is_inheritable(&self) -> bool {
        matches!(
            self,
            ContractKind::Contract | ContractKind::AbstractContract | ContractKind::Interface
        )
    }

    /// Stateful declarations may hold contract handles and issue external
    /// calls; the stateless asset script may not.
    pub fn is_stateful(&self) -> bool {
        !matches!(self, ContractKind::AssetScript)
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ContractKind::Contract => "Contract",
            ContractKind::AbstractContract => "Abstract Contract",
            ContractKind::Interface => "Interface",
            ContractKind::TxScript => "TxScript",
            ContractKind::AssetScript => "AssetScript",
        };
        write!(f, "{}", text)
    }
}
