//! Compilation errors. Every error is fatal to the compilation that raised
//! it; the `Display` strings are the user-facing messages and tests match on
//! their substrings, so they are part of the compiler's stable surface.

use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Invalid contract index {index}")]
    InvalidContractIndex { index: usize },
    #[error("Expect {expected} at index {index}, got {got}")]
    UnexpectedDeclarationKind {
        index: usize,
        expected: &'static str,
        got: String,
    },
    #[error("Invalid compiler option {name}: {value}")]
    InvalidCompilerOption { name: &'static str, value: String },

    #[error("Variable {name} does not exist")]
    VariableNotFound { name: String },
    #[error("Variable {name} is defined multiple times")]
    DuplicateVariable { name: String },
    #[error("Function {name} does not exist")]
    FunctionNotFound { name: String },
    #[error("These functions are defined multiple times: {names}")]
    DuplicateFunctions { names: String },
    #[error("Event {name} does not exist")]
    EventNotFound { name: String },
    #[error("These events are defined multiple times: {names}")]
    DuplicateEvents { names: String },
    #[error("Contract {name} does not exist")]
    ContractNotFound { name: String },
    #[error("These contracts are defined multiple times: {names}")]
    DuplicateContracts { names: String },
    #[error("Function {type_id}.{func} does not exist")]
    ExternalFunctionNotFound { type_id: String, func: String },
    #[error("Can not call private function {type_id}.{func}")]
    CallPrivateExternal { type_id: String, func: String },

    #[error("Invalid type of condition expr: {found}")]
    InvalidConditionType { found: String },
    #[error("Assign {rhs} to {lhs}")]
    AssignmentTypeMismatch { rhs: String, lhs: String },
    #[error("Assign to immutable variable: {name}")]
    AssignToImmutable { name: String },
    #[error("Invalid number of bindings, expect {expected} values, got {got}")]
    InvalidDestructuring { expected: usize, got: usize },
    #[error("Array elements should have same type")]
    ArrayElementTypeMismatch,
    #[error("Array literal cannot be empty")]
    EmptyArray,
    #[error("Expect array type, got {found}")]
    ExpectArrayType { found: String },
    #[error("Invalid array index {index}")]
    InvalidArrayIndex { index: String },
    #[error("Array type not supported for template variable {name}")]
    TemplateArrayNotSupported { name: String },
    #[error("Invalid operand types {types} for operator {op}")]
    InvalidOperandTypes { op: String, types: String },
    #[error("Invalid types of if-else expr branches, expect {if_branch}, got {else_branch}")]
    IfElseBranchTypeMismatch {
        if_branch: String,
        else_branch: String,
    },
    #[error("Expect single value expression, got {found}")]
    ExpectSingleType { found: String },
    #[error("Invalid args type {got}, expect {expect}")]
    InvalidArgsType { got: String, expect: String },
    #[error("Invalid return types {got} for func {func}, expect {expect}")]
    InvalidReturnTypes {
        func: String,
        got: String,
        expect: String,
    },
    #[error("Expect return statement for function {func}")]
    ExpectReturnStatement { func: String },
    #[error("Expect contract for {func} of {obj}")]
    ExpectContract { func: String, obj: String },
    #[error("{name} is not instantiable")]
    NotInstantiable { name: String },
    #[error("External calls are not allowed in stateless scripts")]
    ExternalCallInStatelessContext,
    #[error("Placeholder is only allowed inside a loop body")]
    PlaceholderOutsideLoop,

    #[error("Cyclic inheritance detected for contract {name}")]
    CyclicInheritance { name: String },
    #[error("{parent} can not be inherited by {child}")]
    NotInheritable { parent: String, child: String },
    #[error("Invalid contract inheritance fields, expect {expected}, have {have}")]
    InvalidInheritanceFields { expected: String, have: String },
    #[error("Contract {name} has unimplemented methods: {methods}")]
    UnimplementedMethods { name: String, methods: String },
    #[error("Interface {name} has implemented methods: {methods}")]
    InterfaceWithImplementedMethods { name: String, methods: String },
    #[error("Function {func} is implemented with wrong signature")]
    WrongImplementationSignature { func: String },
    #[error("Abstract contract {name} can not be compiled into bytecode")]
    CompileAbstractContract { name: String },
    #[error("Expect the first method of TxScript {name} to be public and the rest private")]
    InvalidScriptMethodVisibility { name: String },

    #[error("No permission check for function: {type_id}.{func}")]
    NoPermissionCheck { type_id: String, func: String },

    #[error("loop range too large")]
    LoopRangeTooLarge,
    #[error("loop step cannot be zero")]
    LoopZeroStep,
    #[error("Invalid loop bound: {found}")]
    InvalidLoopBound { found: String },
    #[error("Loop body should not define new variables")]
    LoopBodyVarDef,
    #[error("Loop body should not have return statement")]
    LoopBodyReturn,

    #[error("Too many instrs for if-else branches")]
    TooManyIfElseInstrs,
    #[error("Too many instrs for while-loop body")]
    TooManyWhileInstrs,
    #[error("Too many local variables in function {func}")]
    TooManyLocals { func: String },
    #[error("Too many fields in contract {name}")]
    TooManyFields { name: String },
    #[error("Too many methods in {name}")]
    TooManyMethods { name: String },
    #[error("Too many fields for event {name}")]
    TooManyEventFields { name: String },
    #[error("Array type not supported for event {name}")]
    EventArrayField { name: String },

    #[error("Internal compiler error: {0}")]
    Internal(&'static str),
}

impl CompileError {
    /// The user-facing message. Identical to the `Display` rendering; kept as
    /// an explicit accessor for callers that store messages.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
