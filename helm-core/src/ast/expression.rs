use crate::ast::TypeCell;
use crate::semantic_analysis::{infer_call_type, infer_contract_call_type, CompilerState};
use helm_asm::Instr;
use helm_error::{CompileError, CompileResult};
use helm_types::{format_types, FuncId, Ident, Type, TypeId, Val, U256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOperator::*;
        let text = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
        };
        write!(f, "{}", text)
    }
}

impl BinaryOperator {
    /// The result type for equal operand types, or `None` when the operator
    /// is not defined for that type. Arithmetic and comparison cover the
    /// integer primitives, equality covers every primitive (notably not
    /// arrays), and the logical operators cover `Bool`.
    pub(crate) fn result_type(&self, operand: &Type) -> Option<Type> {
        use BinaryOperator::*;
        match self {
            Add | Sub | Mul | Div | Mod if operand.is_integer() => Some(operand.clone()),
            Lt | Le | Gt | Ge if operand.is_integer() => Some(Type::Bool),
            Eq | Ne
                if matches!(
                    operand,
                    Type::Bool | Type::I256 | Type::U256 | Type::ByteVec | Type::Address
                ) =>
            {
                Some(Type::Bool)
            }
            And | Or if *operand == Type::Bool => Some(Type::Bool),
            _ => None,
        }
    }

    /// The opcode implementing this operator for the given operand type.
    pub(crate) fn to_instr(&self, operand: &Type) -> Option<Instr> {
        use BinaryOperator::*;
        let instr = match (self, operand) {
            (Add, Type::U256) => Instr::U256Add,
            (Sub, Type::U256) => Instr::U256Sub,
            (Mul, Type::U256) => Instr::U256Mul,
            (Div, Type::U256) => Instr::U256Div,
            (Mod, Type::U256) => Instr::U256Mod,
            (Add, Type::I256) => Instr::I256Add,
            (Sub, Type::I256) => Instr::I256Sub,
            (Mul, Type::I256) => Instr::I256Mul,
            (Div, Type::I256) => Instr::I256Div,
            (Mod, Type::I256) => Instr::I256Mod,
            (Lt, Type::U256) => Instr::U256Lt,
            (Le, Type::U256) => Instr::U256Le,
            (Gt, Type::U256) => Instr::U256Gt,
            (Ge, Type::U256) => Instr::U256Ge,
            (Lt, Type::I256) => Instr::I256Lt,
            (Le, Type::I256) => Instr::I256Le,
            (Gt, Type::I256) => Instr::I256Gt,
            (Ge, Type::I256) => Instr::I256Ge,
            (Eq, Type::Bool) => Instr::BoolEq,
            (Ne, Type::Bool) => Instr::BoolNeq,
            (Eq, Type::U256) => Instr::U256Eq,
            (Ne, Type::U256) => Instr::U256Neq,
            (Eq, Type::I256) => Instr::I256Eq,
            (Ne, Type::I256) => Instr::I256Neq,
            (Eq, Type::ByteVec) => Instr::ByteVecEq,
            (Ne, Type::ByteVec) => Instr::ByteVecNeq,
            (Eq, Type::Address) => Instr::AddressEq,
            (Ne, Type::Address) => Instr::AddressNeq,
            (And, Type::Bool) => Instr::And,
            (Or, Type::Bool) => Instr::Or,
            _ => return None,
        };
        Some(instr)
    }
}

/// Optional asset approval metadata attached to a call.
#[derive(Debug, Clone)]
pub struct ApproveAsset {
    pub address: Expr,
    pub alph_amount: Option<Expr>,
    pub tokens: Vec<(Expr, Expr)>,
}

/// A call to a function of the current compilation unit or a built-in.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub id: FuncId,
    pub approve_assets: Vec<ApproveAsset>,
    pub args: Vec<Expr>,
}

impl CallExpr {
    pub fn new(id: FuncId, args: Vec<Expr>) -> Self {
        CallExpr {
            id,
            approve_assets: Vec::new(),
            args,
        }
    }
}

/// A call into another contract through a contract handle.
#[derive(Debug, Clone)]
pub struct ContractCallExpr {
    pub obj: Box<Expr>,
    pub func: FuncId,
    pub approve_assets: Vec<ApproveAsset>,
    pub args: Vec<Expr>,
}

impl ContractCallExpr {
    pub fn new(obj: Expr, func: FuncId, args: Vec<Expr>) -> Self {
        ContractCallExpr {
            obj: Box::new(obj),
            func,
            approve_assets: Vec::new(),
            args,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A constant literal.
    Const(Val),
    /// `[e1, ..., en]`
    CreateArray(Vec<Expr>),
    /// `[element; count]`
    RepeatArray { element: Box<Expr>, count: usize },
    /// `a[i]...[k]`
    ArrayElement {
        array: Box<Expr>,
        indexes: Vec<Expr>,
    },
    Variable(Ident),
    /// `EnumName.FieldName`
    EnumField { enum_id: TypeId, field: Ident },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `ContractName(addressExpr)`: byte-vector to contract handle.
    ContractConv {
        contract_type: TypeId,
        address: Box<Expr>,
    },
    Call(CallExpr),
    ContractCall(ContractCallExpr),
    Paren(Box<Expr>),
    IfElse {
        condition: Box<Expr>,
        if_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// The `?` placeholder inside an unrolled loop body.
    Placeholder,
}

/// An expression node together with its memoised type vector.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub(crate) tpe: TypeCell,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Expr {
        Expr {
            kind,
            tpe: TypeCell::default(),
        }
    }

    pub fn const_val(value: Val) -> Expr {
        Expr::new(ExprKind::Const(value))
    }

    pub fn u256(value: u64) -> Expr {
        Expr::const_val(Val::u256(value))
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::const_val(Val::Bool(value))
    }

    pub fn variable(name: impl Into<String>) -> Expr {
        Expr::new(ExprKind::Variable(Ident::new(name)))
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::new(ExprKind::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn not(expr: Expr) -> Expr {
        Expr::new(ExprKind::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(expr),
        })
    }

    pub fn array(elements: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::CreateArray(elements))
    }

    pub fn index(array: Expr, indexes: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::ArrayElement {
            array: Box::new(array),
            indexes,
        })
    }

    pub fn call(id: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Call(CallExpr::new(FuncId::new(id), args)))
    }

    pub fn placeholder() -> Expr {
        Expr::new(ExprKind::Placeholder)
    }

    /// The constant value of this expression, looking through parentheses.
    pub(crate) fn as_const(&self) -> Option<&Val> {
        match &self.kind {
            ExprKind::Const(value) => Some(value),
            ExprKind::Paren(inner) => inner.as_const(),
            _ => None,
        }
    }

    pub(crate) fn as_const_u256(&self) -> Option<U256> {
        match self.as_const() {
            Some(Val::U256(value)) => Some(*value),
            _ => None,
        }
    }

    /// Short rendering for error messages.
    pub(crate) fn brief(&self) -> String {
        match &self.kind {
            ExprKind::Variable(ident) => ident.to_string(),
            ExprKind::Paren(inner) => inner.brief(),
            ExprKind::Const(value) => value.to_string(),
            ExprKind::ContractConv { contract_type, .. } => contract_type.to_string(),
            ExprKind::Call(call) => format!("{}(..)", call.id),
            ExprKind::ContractCall(call) => format!("{}(..)", call.func),
            _ => "expression".to_string(),
        }
    }

    /// The memoised type vector of this expression; computed (and cached) on
    /// the first query.
    pub fn get_type(&self, state: &mut CompilerState) -> CompileResult<Vec<Type>> {
        self.tpe
            .get_or_try_init(|| self.infer_type(state))
            .map(|types| types.clone())
    }

    /// The type of an expression required to produce exactly one value.
    pub fn single_type(&self, state: &mut CompilerState) -> CompileResult<Type> {
        let types = self.get_type(state)?;
        match <[Type; 1]>::try_from(types) {
            Ok([tpe]) => Ok(tpe),
            Err(types) => Err(CompileError::ExpectSingleType {
                found: format_types(&types),
            }),
        }
    }

    fn infer_type(&self, state: &mut CompilerState) -> CompileResult<Vec<Type>> {
        match &self.kind {
            ExprKind::Const(value) => Ok(vec![value.tpe()]),
            ExprKind::CreateArray(elements) => {
                let first = elements.first().ok_or(CompileError::EmptyArray)?;
                let elem_type = first.single_type(state)?;
                for element in &elements[1..] {
                    if element.single_type(state)? != elem_type {
                        return Err(CompileError::ArrayElementTypeMismatch);
                    }
                }
                Ok(vec![Type::array(elem_type, elements.len())])
            }
            ExprKind::RepeatArray { element, count } => {
                if *count == 0 {
                    return Err(CompileError::EmptyArray);
                }
                let elem_type = element.single_type(state)?;
                Ok(vec![Type::array(elem_type, *count)])
            }
            ExprKind::ArrayElement { array, indexes } => {
                let array_type = array.single_type(state)?;
                check_array_indexes(state, &array_type, indexes)?;
                let elem = array_type
                    .element_type(indexes.len())
                    .ok_or_else(|| CompileError::ExpectArrayType {
                        found: array_type.to_string(),
                    })?;
                Ok(vec![elem.clone()])
            }
            ExprKind::Variable(ident) => {
                let info = state.get_variable(ident)?;
                Ok(vec![info.tpe().clone()])
            }
            ExprKind::EnumField { enum_id, field } => {
                let key = Ident::new(format!("{}.{}", enum_id, field));
                let info = state.get_variable(&key)?;
                Ok(vec![info.tpe().clone()])
            }
            ExprKind::UnaryOp { op, expr } => {
                let operand = expr.get_type(state)?;
                match (op, operand.as_slice()) {
                    (UnaryOperator::Not, [Type::Bool]) => Ok(vec![Type::Bool]),
                    _ => Err(CompileError::InvalidOperandTypes {
                        op: op.to_string(),
                        types: format_types(&operand),
                    }),
                }
            }
            ExprKind::BinaryOp { op, left, right } => {
                let left_type = left.single_type(state)?;
                let right_type = right.single_type(state)?;
                if left_type != right_type {
                    return Err(CompileError::InvalidOperandTypes {
                        op: op.to_string(),
                        types: format_types(&[left_type, right_type]),
                    });
                }
                match op.result_type(&left_type) {
                    Some(result) => Ok(vec![result]),
                    None => Err(CompileError::InvalidOperandTypes {
                        op: op.to_string(),
                        types: format_types(&[left_type.clone(), left_type]),
                    }),
                }
            }
            ExprKind::ContractConv {
                contract_type,
                address,
            } => {
                if !state.kind().is_stateful() {
                    return Err(CompileError::ExternalCallInStatelessContext);
                }
                let address_type = address.get_type(state)?;
                if address_type != [Type::ByteVec] {
                    return Err(CompileError::InvalidArgsType {
                        got: format_types(&address_type),
                        expect: "[ByteVec]".to_string(),
                    });
                }
                let meta = state.registry().get(contract_type)?;
                if !meta.kind.is_instantiable() {
                    return Err(CompileError::NotInstantiable {
                        name: contract_type.to_string(),
                    });
                }
                Ok(vec![Type::Contract(contract_type.clone())])
            }
            ExprKind::Call(call) => infer_call_type(state, call),
            ExprKind::ContractCall(call) => infer_contract_call_type(state, call),
            ExprKind::Paren(inner) => inner.get_type(state),
            ExprKind::IfElse {
                condition,
                if_expr,
                else_expr,
            } => {
                let condition_type = condition.get_type(state)?;
                if condition_type != [Type::Bool] {
                    return Err(CompileError::InvalidConditionType {
                        found: format_types(&condition_type),
                    });
                }
                let if_types = if_expr.get_type(state)?;
                let else_types = else_expr.get_type(state)?;
                if if_types != else_types {
                    return Err(CompileError::IfElseBranchTypeMismatch {
                        if_branch: format_types(&if_types),
                        else_branch: format_types(&else_types),
                    });
                }
                Ok(if_types)
            }
            ExprKind::Placeholder => Err(CompileError::PlaceholderOutsideLoop),
        }
    }
}

/// Validates an index sequence against an array type: every index must be a
/// single `U256`, and constant indexes must be in bounds at every layer.
pub(crate) fn check_array_indexes(
    state: &mut CompilerState,
    array_type: &Type,
    indexes: &[Expr],
) -> CompileResult<()> {
    let mut current = array_type;
    for index in indexes {
        let (elem, size) = match current {
            Type::FixedSizeArray { elem, size } => (elem.as_ref(), *size),
            _ => {
                return Err(CompileError::ExpectArrayType {
                    found: current.to_string(),
                })
            }
        };
        let index_type = index.single_type(state)?;
        if index_type != Type::U256 {
            return Err(CompileError::InvalidArrayIndex {
                index: index_type.to_string(),
            });
        }
        if let Some(value) = index.as_const_u256() {
            if value >= U256::from(size as u64) {
                return Err(CompileError::InvalidArrayIndex {
                    index: value.to_string(),
                });
            }
        }
        current = elem;
    }
    Ok(())
}
