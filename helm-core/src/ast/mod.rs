//! The abstract syntax tree the external parser hands to the compiler. Nodes
//! are immutable after construction except for the write-once memoised type
//! slot on every expression (and the memoised expansion of unrolled loops).

mod contract;
mod declaration;
pub(crate) mod expression;
mod statement;

pub use contract::{AssetScript, Contract, ContractInterface, Declaration, MultiContract, TxScript};
pub use declaration::{
    Annotation, AnnotationField, Argument, ConstantVarDef, ContractInheritance, EnumDef, EnumField,
    EventDef, EventField, FuncDef, Inheritance, InterfaceInheritance,
};
pub use expression::{
    ApproveAsset, BinaryOperator, CallExpr, ContractCallExpr, Expr, ExprKind, UnaryOperator,
};
pub use statement::{AssignmentTarget, Statement, UnrolledLoop, VarDeclaration};

use helm_error::{CompileError, CompileResult};
use helm_types::Type;
use std::cell::OnceCell;

/// Write-once cache for an expression's computed type vector. Set by the
/// first `get_type` query and never cleared.
#[derive(Debug, Clone, Default)]
pub struct TypeCell {
    cell: OnceCell<Vec<Type>>,
}

impl TypeCell {
    pub(crate) fn get_or_try_init(
        &self,
        init: impl FnOnce() -> CompileResult<Vec<Type>>,
    ) -> CompileResult<&Vec<Type>> {
        if let Some(types) = self.cell.get() {
            return Ok(types);
        }
        let types = init()?;
        let _ = self.cell.set(types);
        self.cell
            .get()
            .ok_or(CompileError::Internal("type cell initialisation"))
    }

    pub(crate) fn get(&self) -> Option<&Vec<Type>> {
        self.cell.get()
    }
}
