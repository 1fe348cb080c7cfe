use crate::ast::expression::{ApproveAsset, CallExpr, ContractCallExpr, Expr, ExprKind};
use helm_error::{CompileError, CompileResult};
use helm_types::{Ident, TypeId, Val, I256, U256};
use std::cell::OnceCell;

/// One binding position of a destructuring `let`.
#[derive(Debug, Clone)]
pub enum VarDeclaration {
    Named {
        ident: Ident,
        is_mutable: bool,
        is_unused: bool,
    },
    /// `_`: the value cells are discarded.
    Anonymous,
}

impl VarDeclaration {
    pub fn named(ident: impl Into<String>, is_mutable: bool) -> Self {
        VarDeclaration::Named {
            ident: Ident::new(ident),
            is_mutable,
            is_unused: false,
        }
    }
}

/// The left-hand side of one assignment target.
#[derive(Debug, Clone)]
pub enum AssignmentTarget {
    Var(Ident),
    ArrayElement { ident: Ident, indexes: Vec<Expr> },
}

impl AssignmentTarget {
    pub fn var(ident: impl Into<String>) -> Self {
        AssignmentTarget::Var(Ident::new(ident))
    }

    pub fn ident(&self) -> &Ident {
        match self {
            AssignmentTarget::Var(ident) => ident,
            AssignmentTarget::ArrayElement { ident, .. } => ident,
        }
    }
}

/// A compile-time unrolled `loop(from, to, step, body)`. The bounds must be
/// integer literals; every iteration clones the body with the `?`
/// placeholder replaced by the iteration value. The expansion is memoised so
/// the check and generation passes see the identical statements.
#[derive(Debug, Clone)]
pub struct UnrolledLoop {
    pub from: Expr,
    pub to: Expr,
    pub step: Expr,
    pub body: Box<Statement>,
    pub(crate) expanded: OnceCell<Vec<Statement>>,
}

impl UnrolledLoop {
    pub fn new(from: Expr, to: Expr, step: Expr, body: Statement) -> Self {
        UnrolledLoop {
            from,
            to,
            step,
            body: Box::new(body),
            expanded: OnceCell::new(),
        }
    }

    /// The unrolled statements, computed on first use.
    pub(crate) fn expanded(&self, limit: usize) -> CompileResult<&[Statement]> {
        if let Some(statements) = self.expanded.get() {
            return Ok(statements);
        }
        let statements = self.expand(limit)?;
        let _ = self.expanded.set(statements);
        self.expanded
            .get()
            .map(Vec::as_slice)
            .ok_or(CompileError::Internal("loop expansion initialisation"))
    }

    fn expand(&self, limit: usize) -> CompileResult<Vec<Statement>> {
        if self.body.contains_var_def() {
            return Err(CompileError::LoopBodyVarDef);
        }
        if self.body.contains_return() {
            return Err(CompileError::LoopBodyReturn);
        }
        let values = iteration_values(&self.from, &self.to, &self.step, limit)?;
        Ok(values
            .iter()
            .map(|value| self.body.replace_placeholder(value))
            .collect())
    }
}

fn loop_bound(expr: &Expr) -> CompileResult<Val> {
    match expr.as_const() {
        Some(value @ (Val::U256(_) | Val::I256(_))) => Ok(value.clone()),
        Some(other) => Err(CompileError::InvalidLoopBound {
            found: other.to_string(),
        }),
        None => Err(CompileError::InvalidLoopBound {
            found: expr.brief(),
        }),
    }
}

fn ceil_div(range: U256, step: U256) -> U256 {
    let count = range / step;
    if (range % step).is_zero() {
        count
    } else {
        count + U256::one()
    }
}

/// The sequence of placeholder values for `loop(from, to, step, _)`. The
/// bounds must share one integer type, the step must be non-zero, and the
/// iteration count `ceil((to - from) / step)` must not exceed `limit`.
fn iteration_values(from: &Expr, to: &Expr, step: &Expr, limit: usize) -> CompileResult<Vec<Val>> {
    let from = loop_bound(from)?;
    let to = loop_bound(to)?;
    let step = loop_bound(step)?;
    match (&from, &to, &step) {
        (Val::U256(from), Val::U256(to), Val::U256(step)) => {
            if step.is_zero() {
                return Err(CompileError::LoopZeroStep);
            }
            if to <= from {
                return Ok(Vec::new());
            }
            let count = ceil_div(*to - *from, *step);
            if count > U256::from(limit as u64) {
                return Err(CompileError::LoopRangeTooLarge);
            }
            let mut values = Vec::new();
            let mut current = *from;
            for _ in 0..count.low_u64() {
                values.push(Val::U256(current));
                current = match current.checked_add(*step) {
                    Some(next) => next,
                    None => break,
                };
            }
            Ok(values)
        }
        (Val::I256(from), Val::I256(to), Val::I256(step)) => {
            if step.is_zero() {
                return Err(CompileError::LoopZeroStep);
            }
            let ascending = !step.is_negative();
            if (ascending && to <= from) || (!ascending && to >= from) {
                return Ok(Vec::new());
            }
            let range = signed_range_magnitude(*from, *to)?;
            let count = ceil_div(range, step.magnitude());
            if count > U256::from(limit as u64) {
                return Err(CompileError::LoopRangeTooLarge);
            }
            let mut values = Vec::new();
            let mut current = *from;
            for _ in 0..count.low_u64() {
                values.push(Val::I256(current));
                current = match current.checked_add(*step) {
                    Some(next) => next,
                    None => break,
                };
            }
            Ok(values)
        }
        _ => Err(CompileError::InvalidLoopBound {
            found: format!("{}, {}, {}", from, to, step),
        }),
    }
}

/// `|to - from|` as an unsigned magnitude. Overflowing the unsigned range is
/// only possible for ranges far beyond any representable unrolling limit.
fn signed_range_magnitude(from: I256, to: I256) -> CompileResult<U256> {
    let (low, high) = if from <= to { (from, to) } else { (to, from) };
    if low.is_negative() == high.is_negative() {
        match high.checked_sub(low) {
            Some(diff) => Ok(diff.magnitude()),
            None => Err(CompileError::LoopRangeTooLarge),
        }
    } else {
        high.magnitude()
            .checked_add(low.magnitude())
            .ok_or(CompileError::LoopRangeTooLarge)
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    /// `let <bindings> = value`
    VarDef {
        declarations: Vec<VarDeclaration>,
        value: Expr,
    },
    /// `t1, ..., tn = value`
    Assign {
        targets: Vec<AssignmentTarget>,
        value: Expr,
    },
    /// A call in statement position; its return cells are popped.
    FuncCall(CallExpr),
    ContractCall(ContractCallExpr),
    IfElse {
        condition: Expr,
        if_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    While {
        condition: Expr,
        body: Vec<Statement>,
    },
    For {
        init: Box<Statement>,
        condition: Expr,
        update: Box<Statement>,
        body: Vec<Statement>,
    },
    Loop(UnrolledLoop),
    Return(Vec<Expr>),
    EmitEvent { id: TypeId, args: Vec<Expr> },
}

impl Statement {
    pub fn let_var(ident: impl Into<String>, is_mutable: bool, value: Expr) -> Statement {
        Statement::VarDef {
            declarations: vec![VarDeclaration::named(ident, is_mutable)],
            value,
        }
    }

    pub fn assign(ident: impl Into<String>, value: Expr) -> Statement {
        Statement::Assign {
            targets: vec![AssignmentTarget::var(ident)],
            value,
        }
    }

    pub fn ret(exprs: Vec<Expr>) -> Statement {
        Statement::Return(exprs)
    }

    fn any_statement(&self, pred: &impl Fn(&Statement) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Statement::IfElse {
                if_branch,
                else_branch,
                ..
            } => if_branch
                .iter()
                .chain(else_branch.iter())
                .any(|stmt| stmt.any_statement(pred)),
            Statement::While { body, .. } => body.iter().any(|stmt| stmt.any_statement(pred)),
            Statement::For {
                init, update, body, ..
            } => {
                init.any_statement(pred)
                    || update.any_statement(pred)
                    || body.iter().any(|stmt| stmt.any_statement(pred))
            }
            Statement::Loop(unrolled) => unrolled.body.any_statement(pred),
            _ => false,
        }
    }

    pub(crate) fn contains_var_def(&self) -> bool {
        self.any_statement(&|stmt| matches!(stmt, Statement::VarDef { .. }))
    }

    pub(crate) fn contains_return(&self) -> bool {
        self.any_statement(&|stmt| matches!(stmt, Statement::Return(_)))
    }

    /// Rebuilds the statement with every `?` replaced by `value`. All nodes
    /// are freshly constructed so each unrolled iteration owns its own type
    /// cache.
    pub(crate) fn replace_placeholder(&self, value: &Val) -> Statement {
        match self {
            Statement::VarDef {
                declarations,
                value: rhs,
            } => Statement::VarDef {
                declarations: declarations.clone(),
                value: rhs.replace_placeholder(value),
            },
            Statement::Assign { targets, value: rhs } => Statement::Assign {
                targets: targets
                    .iter()
                    .map(|target| target.replace_placeholder(value))
                    .collect(),
                value: rhs.replace_placeholder(value),
            },
            Statement::FuncCall(call) => Statement::FuncCall(call.replace_placeholder(value)),
            Statement::ContractCall(call) => {
                Statement::ContractCall(call.replace_placeholder(value))
            }
            Statement::IfElse {
                condition,
                if_branch,
                else_branch,
            } => Statement::IfElse {
                condition: condition.replace_placeholder(value),
                if_branch: replace_all(if_branch, value),
                else_branch: replace_all(else_branch, value),
            },
            Statement::While { condition, body } => Statement::While {
                condition: condition.replace_placeholder(value),
                body: replace_all(body, value),
            },
            Statement::For {
                init,
                condition,
                update,
                body,
            } => Statement::For {
                init: Box::new(init.replace_placeholder(value)),
                condition: condition.replace_placeholder(value),
                update: Box::new(update.replace_placeholder(value)),
                body: replace_all(body, value),
            },
            Statement::Loop(unrolled) => Statement::Loop(UnrolledLoop::new(
                unrolled.from.replace_placeholder(value),
                unrolled.to.replace_placeholder(value),
                unrolled.step.replace_placeholder(value),
                unrolled.body.replace_placeholder(value),
            )),
            Statement::Return(exprs) => Statement::Return(
                exprs
                    .iter()
                    .map(|expr| expr.replace_placeholder(value))
                    .collect(),
            ),
            Statement::EmitEvent { id, args } => Statement::EmitEvent {
                id: id.clone(),
                args: args
                    .iter()
                    .map(|arg| arg.replace_placeholder(value))
                    .collect(),
            },
        }
    }
}

fn replace_all(statements: &[Statement], value: &Val) -> Vec<Statement> {
    statements
        .iter()
        .map(|stmt| stmt.replace_placeholder(value))
        .collect()
}

impl AssignmentTarget {
    fn replace_placeholder(&self, value: &Val) -> AssignmentTarget {
        match self {
            AssignmentTarget::Var(ident) => AssignmentTarget::Var(ident.clone()),
            AssignmentTarget::ArrayElement { ident, indexes } => AssignmentTarget::ArrayElement {
                ident: ident.clone(),
                indexes: indexes
                    .iter()
                    .map(|index| index.replace_placeholder(value))
                    .collect(),
            },
        }
    }
}

impl ApproveAsset {
    fn replace_placeholder(&self, value: &Val) -> ApproveAsset {
        ApproveAsset {
            address: self.address.replace_placeholder(value),
            alph_amount: self
                .alph_amount
                .as_ref()
                .map(|amount| amount.replace_placeholder(value)),
            tokens: self
                .tokens
                .iter()
                .map(|(id, amount)| {
                    (
                        id.replace_placeholder(value),
                        amount.replace_placeholder(value),
                    )
                })
                .collect(),
        }
    }
}

impl CallExpr {
    fn replace_placeholder(&self, value: &Val) -> CallExpr {
        CallExpr {
            id: self.id.clone(),
            approve_assets: self
                .approve_assets
                .iter()
                .map(|asset| asset.replace_placeholder(value))
                .collect(),
            args: self
                .args
                .iter()
                .map(|arg| arg.replace_placeholder(value))
                .collect(),
        }
    }
}

impl ContractCallExpr {
    fn replace_placeholder(&self, value: &Val) -> ContractCallExpr {
        ContractCallExpr {
            obj: Box::new(self.obj.replace_placeholder(value)),
            func: self.func.clone(),
            approve_assets: self
                .approve_assets
                .iter()
                .map(|asset| asset.replace_placeholder(value))
                .collect(),
            args: self
                .args
                .iter()
                .map(|arg| arg.replace_placeholder(value))
                .collect(),
        }
    }
}

impl Expr {
    pub(crate) fn replace_placeholder(&self, value: &Val) -> Expr {
        let kind = match &self.kind {
            ExprKind::Placeholder => ExprKind::Const(value.clone()),
            ExprKind::Const(v) => ExprKind::Const(v.clone()),
            ExprKind::CreateArray(elements) => ExprKind::CreateArray(
                elements
                    .iter()
                    .map(|element| element.replace_placeholder(value))
                    .collect(),
            ),
            ExprKind::RepeatArray { element, count } => ExprKind::RepeatArray {
                element: Box::new(element.replace_placeholder(value)),
                count: *count,
            },
            ExprKind::ArrayElement { array, indexes } => ExprKind::ArrayElement {
                array: Box::new(array.replace_placeholder(value)),
                indexes: indexes
                    .iter()
                    .map(|index| index.replace_placeholder(value))
                    .collect(),
            },
            ExprKind::Variable(ident) => ExprKind::Variable(ident.clone()),
            ExprKind::EnumField { enum_id, field } => ExprKind::EnumField {
                enum_id: enum_id.clone(),
                field: field.clone(),
            },
            ExprKind::UnaryOp { op, expr } => ExprKind::UnaryOp {
                op: *op,
                expr: Box::new(expr.replace_placeholder(value)),
            },
            ExprKind::BinaryOp { op, left, right } => ExprKind::BinaryOp {
                op: *op,
                left: Box::new(left.replace_placeholder(value)),
                right: Box::new(right.replace_placeholder(value)),
            },
            ExprKind::ContractConv {
                contract_type,
                address,
            } => ExprKind::ContractConv {
                contract_type: contract_type.clone(),
                address: Box::new(address.replace_placeholder(value)),
            },
            ExprKind::Call(call) => ExprKind::Call(call.replace_placeholder(value)),
            ExprKind::ContractCall(call) => ExprKind::ContractCall(call.replace_placeholder(value)),
            ExprKind::Paren(inner) => {
                ExprKind::Paren(Box::new(inner.replace_placeholder(value)))
            }
            ExprKind::IfElse {
                condition,
                if_expr,
                else_expr,
            } => ExprKind::IfElse {
                condition: Box::new(condition.replace_placeholder(value)),
                if_expr: Box::new(if_expr.replace_placeholder(value)),
                else_expr: Box::new(else_expr.replace_placeholder(value)),
            },
        };
        Expr::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;

    fn unrolled(from: u64, to: u64, step: u64) -> UnrolledLoop {
        UnrolledLoop::new(
            Expr::u256(from),
            Expr::u256(to),
            Expr::u256(step),
            Statement::assign(
                "x",
                Expr::binary(BinaryOperator::Add, Expr::variable("x"), Expr::placeholder()),
            ),
        )
    }

    #[test]
    fn iteration_count_is_ceiling_of_range_over_step() {
        assert_eq!(unrolled(0, 3, 1).expanded(5).unwrap().len(), 3);
        assert_eq!(unrolled(0, 10, 3).expanded(5).unwrap().len(), 4);
        assert_eq!(unrolled(7, 7, 1).expanded(5).unwrap().len(), 0);
        assert_eq!(unrolled(9, 7, 1).expanded(5).unwrap().len(), 0);
    }

    #[test]
    fn descending_signed_loops_unroll() {
        let unrolled = UnrolledLoop::new(
            Expr::const_val(Val::i256(3)),
            Expr::const_val(Val::i256(-3)),
            Expr::const_val(Val::i256(-2)),
            Statement::assign("x", Expr::placeholder()),
        );
        let statements = unrolled.expanded(16).unwrap();
        assert_eq!(statements.len(), 3);
        match &statements[2] {
            Statement::Assign { value, .. } => {
                assert_eq!(value.as_const(), Some(&Val::i256(-1)));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn range_beyond_limit_is_rejected() {
        assert_eq!(
            unrolled(0, 3, 1).expanded(2).unwrap_err(),
            CompileError::LoopRangeTooLarge
        );
    }

    #[test]
    fn zero_step_is_rejected() {
        assert_eq!(
            unrolled(0, 3, 0).expanded(5).unwrap_err(),
            CompileError::LoopZeroStep
        );
    }

    #[test]
    fn loop_bodies_reject_declarations_and_returns() {
        let with_let = UnrolledLoop::new(
            Expr::u256(0),
            Expr::u256(1),
            Expr::u256(1),
            Statement::let_var("y", false, Expr::placeholder()),
        );
        assert_eq!(
            with_let.expanded(5).unwrap_err(),
            CompileError::LoopBodyVarDef
        );

        let with_return = UnrolledLoop::new(
            Expr::u256(0),
            Expr::u256(1),
            Expr::u256(1),
            Statement::ret(vec![Expr::placeholder()]),
        );
        assert_eq!(
            with_return.expanded(5).unwrap_err(),
            CompileError::LoopBodyReturn
        );
    }

    #[test]
    fn placeholders_are_substituted_per_iteration() {
        let statements = unrolled(0, 3, 1).expanded(5).unwrap().to_vec();
        for (i, stmt) in statements.iter().enumerate() {
            match stmt {
                Statement::Assign { value, .. } => match &value.kind {
                    ExprKind::BinaryOp { right, .. } => {
                        assert_eq!(right.as_const(), Some(&Val::u256(i as u64)));
                    }
                    other => panic!("unexpected expr {:?}", other),
                },
                other => panic!("unexpected statement {:?}", other),
            }
        }
    }
}
