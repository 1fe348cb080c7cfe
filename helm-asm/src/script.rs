use crate::Instr;
use serde::{Deserialize, Serialize};

/// One compiled function. Lengths are flattened cell counts; `locals_length`
/// includes the argument cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub is_public: bool,
    pub use_preapproved_assets: bool,
    pub use_assets_in_contract: bool,
    pub args_length: usize,
    pub locals_length: usize,
    pub return_length: usize,
    pub instrs: Vec<Instr>,
}

/// Bytecode of a stateless asset script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatelessScript {
    pub methods: Vec<Method>,
}

/// Bytecode of a stateful transaction script. The compiler guarantees the
/// first method is public and the rest private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulScript {
    pub methods: Vec<Method>,
}

/// Bytecode of a deployable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulContract {
    pub field_length: usize,
    pub methods: Vec<Method>,
}
