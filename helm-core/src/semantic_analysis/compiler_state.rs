use crate::ast::{Declaration, EnumDef, EventDef, FuncDef};
use crate::config::CompilerConfig;
use crate::semantic_analysis::array_ref::{ArrayOffset, ArrayRef};
use helm_asm::{Instr, ToConstInstr};
use helm_error::{CompileError, CompileResult};
use helm_types::{ContractKind, FuncId, Ident, Type, TypeId, Val};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use std::collections::HashSet;

const MAX_SLOT_INDEX: usize = u8::MAX as usize;
const MAX_METHOD_COUNT: usize = u8::MAX as usize + 1;
/// One event index cell plus at most five field cells fit the log opcodes.
const MAX_EVENT_FIELDS: usize = 5;

/// The callable surface of one function, as recorded in the symbol tables
/// and the cross-contract registry.
#[derive(Debug, Clone)]
pub(crate) struct FuncInfo {
    pub id: FuncId,
    pub is_public: bool,
    pub use_preapproved_assets: bool,
    pub use_assets_in_contract: bool,
    pub use_permission_check: bool,
    pub arg_types: Vec<Type>,
    pub return_types: Vec<Type>,
    pub index: u8,
}

impl FuncInfo {
    fn from_def(func: &FuncDef, index: u8) -> Self {
        FuncInfo {
            id: func.id.clone(),
            is_public: func.is_public,
            use_preapproved_assets: func.use_preapproved_assets,
            use_assets_in_contract: func.use_assets_in_contract,
            use_permission_check: func.use_permission_check,
            arg_types: func.arg_types(),
            return_types: func.return_types.clone(),
            index,
        }
    }
}

/// What every contract in the same [crate::ast::MultiContract] exposes,
/// used for external-call type checks.
#[derive(Debug, Clone)]
pub(crate) struct ContractMeta {
    pub kind: ContractKind,
    pub funcs: IndexMap<String, FuncInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    entries: IndexMap<TypeId, ContractMeta>,
}

impl ContractRegistry {
    pub fn empty() -> Self {
        ContractRegistry::default()
    }

    /// Registers every contract and interface of an (extended) declaration
    /// list; scripts are not addressable as types.
    pub(crate) fn from_declarations(declarations: &[Declaration]) -> CompileResult<Self> {
        let mut entries = IndexMap::new();
        for declaration in declarations {
            let funcs = match declaration {
                Declaration::Contract(contract) => &contract.funcs,
                Declaration::Interface(interface) => &interface.funcs,
                _ => continue,
            };
            let funcs = build_func_table(declaration.id(), funcs)?;
            entries.insert(
                declaration.id().clone(),
                ContractMeta {
                    kind: declaration.kind(),
                    funcs,
                },
            );
        }
        Ok(ContractRegistry { entries })
    }

    pub(crate) fn get(&self, id: &TypeId) -> CompileResult<&ContractMeta> {
        self.entries
            .get(id)
            .ok_or_else(|| CompileError::ContractNotFound {
                name: id.to_string(),
            })
    }
}

fn build_func_table(
    owner: &TypeId,
    funcs: &[FuncDef],
) -> CompileResult<IndexMap<String, FuncInfo>> {
    if funcs.len() > MAX_METHOD_COUNT {
        return Err(CompileError::TooManyMethods {
            name: owner.to_string(),
        });
    }
    let mut table: IndexMap<String, FuncInfo> = IndexMap::new();
    let mut duplicated: Vec<String> = Vec::new();
    for (index, func) in funcs.iter().enumerate() {
        let info = FuncInfo::from_def(func, index as u8);
        if table.insert(func.id.name.clone(), info).is_some() {
            duplicated.push(func.id.name.clone());
        }
    }
    if !duplicated.is_empty() {
        return Err(CompileError::DuplicateFunctions {
            names: duplicated.into_iter().unique().join(", "),
        });
    }
    Ok(table)
}

/// Storage class and access path of one registered variable.
#[derive(Debug, Clone)]
pub(crate) enum VarInfo {
    Local {
        tpe: Type,
        is_mutable: bool,
        index: u8,
    },
    Field {
        tpe: Type,
        is_mutable: bool,
        index: u8,
    },
    Template {
        tpe: Type,
        index: u8,
    },
    Constant {
        tpe: Type,
        instrs: Vec<Instr>,
    },
    Array {
        is_mutable: bool,
        ref_: ArrayRef,
    },
}

impl VarInfo {
    pub(crate) fn tpe(&self) -> &Type {
        match self {
            VarInfo::Local { tpe, .. }
            | VarInfo::Field { tpe, .. }
            | VarInfo::Template { tpe, .. }
            | VarInfo::Constant { tpe, .. } => tpe,
            VarInfo::Array { ref_, .. } => &ref_.tpe,
        }
    }

    pub(crate) fn is_mutable(&self) -> bool {
        match self {
            VarInfo::Local { is_mutable, .. }
            | VarInfo::Field { is_mutable, .. }
            | VarInfo::Array { is_mutable, .. } => *is_mutable,
            VarInfo::Template { .. } | VarInfo::Constant { .. } => false,
        }
    }
}

#[derive(Debug, Clone)]
struct VarEntry {
    info: VarInfo,
    is_unused: bool,
    is_generated: bool,
}

/// Per-function allocation state. Slot allocation survives across the check
/// and generation passes (generated temporaries extend it during
/// generation); the traversal state in [TraversalScope] does not.
#[derive(Debug, Clone, Default)]
struct FuncScope {
    var_index: usize,
    fresh_index: usize,
    array_index_var: Option<Ident>,
}

/// Where the current walk is inside a function. Reset by `set_func_scope`,
/// so both passes produce identical scope labels.
#[derive(Debug, Clone)]
struct TraversalScope {
    func: FuncId,
    stack: Vec<String>,
    for_counter: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct EventInfo {
    pub index: usize,
    pub field_types: Vec<Type>,
}

/// Per-compilation-unit state: symbol tables, slot allocators, call graphs,
/// the event table, and the warning accumulator. One exists per contract
/// being compiled and is discarded after its warnings are harvested.
pub struct CompilerState<'a> {
    type_id: TypeId,
    kind: ContractKind,
    pub(crate) config: &'a CompilerConfig,
    registry: &'a ContractRegistry,
    func_table: IndexMap<String, FuncInfo>,
    var_table: IndexMap<String, VarEntry>,
    used_vars: HashSet<String>,
    func_scopes: IndexMap<String, FuncScope>,
    current: Option<TraversalScope>,
    field_index: usize,
    template_index: usize,
    events: IndexMap<String, EventInfo>,
    internal_calls: IndexMap<FuncId, IndexSet<FuncId>>,
    external_calls: IndexMap<FuncId, IndexSet<(TypeId, FuncId)>>,
    direct_permission_checks: HashSet<String>,
    warnings: IndexSet<String>,
}

impl<'a> CompilerState<'a> {
    pub fn new(
        type_id: TypeId,
        kind: ContractKind,
        config: &'a CompilerConfig,
        registry: &'a ContractRegistry,
    ) -> Self {
        CompilerState {
            type_id,
            kind,
            config,
            registry,
            func_table: IndexMap::new(),
            var_table: IndexMap::new(),
            used_vars: HashSet::new(),
            func_scopes: IndexMap::new(),
            current: None,
            field_index: 0,
            template_index: 0,
            events: IndexMap::new(),
            internal_calls: IndexMap::new(),
            external_calls: IndexMap::new(),
            direct_permission_checks: HashSet::new(),
            warnings: IndexSet::new(),
        }
    }

    pub(crate) fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    pub(crate) fn kind(&self) -> ContractKind {
        self.kind
    }

    pub(crate) fn registry(&self) -> &'a ContractRegistry {
        self.registry
    }

    // ---- functions --------------------------------------------------------

    pub(crate) fn add_func_defs(&mut self, funcs: &[FuncDef]) -> CompileResult<()> {
        self.func_table = build_func_table(&self.type_id, funcs)?;
        Ok(())
    }

    pub(crate) fn get_func(&self, id: &FuncId) -> CompileResult<FuncInfo> {
        self.func_table
            .get(&id.name)
            .cloned()
            .ok_or_else(|| CompileError::FunctionNotFound {
                name: id.to_string(),
            })
    }

    pub(crate) fn func_infos(&self) -> &IndexMap<String, FuncInfo> {
        &self.func_table
    }

    pub(crate) fn func_is_public(&self, name: &str) -> bool {
        self.func_table
            .get(name)
            .map_or(false, |info| info.is_public)
    }

    // ---- scopes -----------------------------------------------------------

    pub(crate) fn set_func_scope(&mut self, id: &FuncId) {
        self.func_scopes.entry(id.name.clone()).or_default();
        self.current = Some(TraversalScope {
            func: id.clone(),
            stack: vec![id.name.clone()],
            for_counter: 0,
        });
    }

    pub(crate) fn current_func(&self) -> CompileResult<&FuncId> {
        self.current
            .as_ref()
            .map(|scope| &scope.func)
            .ok_or(CompileError::Internal("no active function scope"))
    }

    /// Opens the sub-scope of a `for` statement. Labels depend only on the
    /// traversal order, which is identical in both passes.
    pub(crate) fn enter_for_scope(&mut self) -> CompileResult<()> {
        let scope = self
            .current
            .as_mut()
            .ok_or(CompileError::Internal("no active function scope"))?;
        let label = format!(
            "{}#for{}",
            scope.stack.last().map(String::as_str).unwrap_or_default(),
            scope.for_counter
        );
        scope.for_counter += 1;
        scope.stack.push(label);
        Ok(())
    }

    pub(crate) fn exit_for_scope(&mut self) -> CompileResult<()> {
        let scope = self
            .current
            .as_mut()
            .ok_or(CompileError::Internal("no active function scope"))?;
        if scope.stack.len() <= 1 {
            return Err(CompileError::Internal("unbalanced for scope"));
        }
        scope.stack.pop();
        Ok(())
    }

    fn innermost_scope(&self) -> CompileResult<&str> {
        self.current
            .as_ref()
            .and_then(|scope| scope.stack.last())
            .map(String::as_str)
            .ok_or(CompileError::Internal("no active function scope"))
    }

    fn base_scope(&self) -> CompileResult<&str> {
        self.current
            .as_ref()
            .and_then(|scope| scope.stack.first())
            .map(String::as_str)
            .ok_or(CompileError::Internal("no active function scope"))
    }

    /// Resolves a name against the scope stack, innermost first, then the
    /// contract-level namespace.
    fn lookup_key(&self, name: &Ident) -> Option<String> {
        if let Some(scope) = &self.current {
            for label in scope.stack.iter().rev() {
                let key = format!("{}.{}", label, name);
                if self.var_table.contains_key(&key) {
                    return Some(key);
                }
            }
        }
        self.var_table.contains_key(name.as_str()).then(|| name.0.clone())
    }

    // ---- variable registration -------------------------------------------

    fn insert_var(
        &mut self,
        key: String,
        info: VarInfo,
        is_unused: bool,
        is_generated: bool,
    ) -> CompileResult<()> {
        if self.var_table.contains_key(&key) {
            return Err(CompileError::DuplicateVariable { name: key });
        }
        self.var_table.insert(
            key,
            VarEntry {
                info,
                is_unused,
                is_generated,
            },
        );
        Ok(())
    }

    fn current_func_scope_mut(&mut self) -> CompileResult<&mut FuncScope> {
        let name = self.base_scope()?.to_string();
        self.func_scopes
            .get_mut(&name)
            .ok_or(CompileError::Internal("missing function scope"))
    }

    fn alloc_local_cells(&mut self, cells: usize) -> CompileResult<usize> {
        let func = self.current_func()?.to_string();
        let scope = self.current_func_scope_mut()?;
        let base = scope.var_index;
        if cells == 0 || base + cells - 1 > MAX_SLOT_INDEX {
            return Err(CompileError::TooManyLocals { func });
        }
        scope.var_index = base + cells;
        Ok(base)
    }

    fn local_var_info(
        &mut self,
        tpe: &Type,
        is_mutable: bool,
    ) -> CompileResult<VarInfo> {
        if let Type::FixedSizeArray { .. } = tpe {
            let base = self.alloc_local_cells(tpe.flattened_length())?;
            Ok(VarInfo::Array {
                is_mutable,
                ref_: ArrayRef {
                    is_local: true,
                    is_mutable,
                    tpe: tpe.clone(),
                    offset: ArrayOffset::Constant(base),
                },
            })
        } else {
            let index = self.alloc_local_cells(1)? as u8;
            Ok(VarInfo::Local {
                tpe: tpe.clone(),
                is_mutable,
                index,
            })
        }
    }

    /// Registers a variable in the current (innermost) scope, assigning its
    /// local slot(s) densely in declaration order.
    pub(crate) fn add_local_variable(
        &mut self,
        ident: &Ident,
        tpe: &Type,
        is_mutable: bool,
        is_unused: bool,
        is_generated: bool,
    ) -> CompileResult<()> {
        if self.lookup_key(ident).is_some() {
            return Err(CompileError::DuplicateVariable {
                name: ident.to_string(),
            });
        }
        let key = format!("{}.{}", self.innermost_scope()?, ident);
        let info = self.local_var_info(tpe, is_mutable)?;
        self.insert_var(key, info, is_unused, is_generated)
    }

    /// Registers a compiler-introduced local under the function's base scope
    /// so it stays addressable outside any `for` sub-scope.
    fn add_generated_local(&mut self, ident: &Ident, tpe: &Type) -> CompileResult<VarInfo> {
        let key = format!("{}.{}", self.base_scope()?, ident);
        let info = self.local_var_info(tpe, true)?;
        self.insert_var(key.clone(), info.clone(), false, true)?;
        self.used_vars.insert(key);
        Ok(info)
    }

    /// A fresh name for a generated temporary in the current function.
    pub(crate) fn fresh_ident(&mut self) -> CompileResult<Ident> {
        let scope = self.current_func_scope_mut()?;
        let index = scope.fresh_index;
        scope.fresh_index += 1;
        Ok(Ident::new(format!("_t{}", index)))
    }

    /// Creates (once per function) and returns a generated temporary local
    /// holding a materialised array, or the runtime offset of one.
    pub(crate) fn fresh_array_temp(&mut self, tpe: &Type) -> CompileResult<ArrayRef> {
        let ident = self.fresh_ident()?;
        match self.add_generated_local(&ident, tpe)? {
            VarInfo::Array { ref_, .. } => Ok(ref_),
            _ => Err(CompileError::Internal("array temp of non-array type")),
        }
    }

    /// The per-function scratch local used to hold dynamically computed
    /// array offsets, allocated on first use.
    pub(crate) fn array_index_var(&mut self) -> CompileResult<u8> {
        let existing = {
            let scope = self.current_func_scope_mut()?;
            scope.array_index_var.clone()
        };
        let ident = match existing {
            Some(ident) => ident,
            None => {
                let ident = self.fresh_ident()?;
                self.add_generated_local(&ident, &Type::U256)?;
                self.current_func_scope_mut()?.array_index_var = Some(ident.clone());
                ident
            }
        };
        let key = format!("{}.{}", self.base_scope()?, ident);
        match self.var_table.get(&key).map(|entry| &entry.info) {
            Some(VarInfo::Local { index, .. }) => Ok(*index),
            _ => Err(CompileError::Internal("missing array index temp")),
        }
    }

    pub(crate) fn add_field_variable(
        &mut self,
        ident: &Ident,
        tpe: &Type,
        is_mutable: bool,
        is_unused: bool,
    ) -> CompileResult<()> {
        let cells = tpe.flattened_length();
        let base = self.field_index;
        if cells == 0 || base + cells - 1 > MAX_SLOT_INDEX {
            return Err(CompileError::TooManyFields {
                name: self.type_id.to_string(),
            });
        }
        self.field_index = base + cells;
        let info = if tpe.is_array() {
            VarInfo::Array {
                is_mutable,
                ref_: ArrayRef {
                    is_local: false,
                    is_mutable,
                    tpe: tpe.clone(),
                    offset: ArrayOffset::Constant(base),
                },
            }
        } else {
            VarInfo::Field {
                tpe: tpe.clone(),
                is_mutable,
                index: base as u8,
            }
        };
        self.insert_var(ident.0.clone(), info, is_unused, false)
    }

    pub(crate) fn add_template_variable(&mut self, ident: &Ident, tpe: &Type) -> CompileResult<()> {
        if tpe.is_array() {
            return Err(CompileError::TemplateArrayNotSupported {
                name: ident.to_string(),
            });
        }
        if self.template_index > MAX_SLOT_INDEX {
            return Err(CompileError::TooManyFields {
                name: self.type_id.to_string(),
            });
        }
        let info = VarInfo::Template {
            tpe: tpe.clone(),
            index: self.template_index as u8,
        };
        self.template_index += 1;
        self.insert_var(ident.0.clone(), info, false, false)
    }

    pub(crate) fn add_constant_variable(&mut self, ident: &Ident, value: &Val) -> CompileResult<()> {
        let info = VarInfo::Constant {
            tpe: value.tpe(),
            instrs: vec![value.to_const_instr()],
        };
        self.insert_var(ident.0.clone(), info, false, false)
    }

    /// Enum fields materialise as constants keyed `"EnumName.FieldName"`.
    pub(crate) fn add_enum_def(&mut self, def: &EnumDef) -> CompileResult<()> {
        for field in &def.fields {
            let ident = Ident::new(format!("{}.{}", def.id, field.ident));
            self.add_constant_variable(&ident, &field.value)?;
        }
        Ok(())
    }

    // ---- events -----------------------------------------------------------

    pub(crate) fn add_event_defs(&mut self, events: &[EventDef]) -> CompileResult<()> {
        let mut duplicated: Vec<String> = Vec::new();
        for def in events {
            if def.fields.len() > MAX_EVENT_FIELDS {
                return Err(CompileError::TooManyEventFields {
                    name: def.id.to_string(),
                });
            }
            if def.fields.iter().any(|field| field.tpe.is_array()) {
                return Err(CompileError::EventArrayField {
                    name: def.id.to_string(),
                });
            }
            let info = EventInfo {
                index: self.events.len(),
                field_types: def.fields.iter().map(|field| field.tpe.clone()).collect(),
            };
            if self.events.insert(def.id.0.clone(), info).is_some() {
                duplicated.push(def.id.0.clone());
            }
        }
        if !duplicated.is_empty() {
            return Err(CompileError::DuplicateEvents {
                names: duplicated.into_iter().unique().join(", "),
            });
        }
        Ok(())
    }

    pub(crate) fn get_event(&self, id: &TypeId) -> CompileResult<&EventInfo> {
        self.events
            .get(id.as_str())
            .ok_or_else(|| CompileError::EventNotFound {
                name: id.to_string(),
            })
    }

    // ---- variable lookup --------------------------------------------------

    /// Looks a variable up through the scope stack and marks it used.
    pub(crate) fn get_variable(&mut self, ident: &Ident) -> CompileResult<VarInfo> {
        let key = self
            .lookup_key(ident)
            .ok_or_else(|| CompileError::VariableNotFound {
                name: ident.to_string(),
            })?;
        self.used_vars.insert(key.clone());
        self.var_table
            .get(&key)
            .map(|entry| entry.info.clone())
            .ok_or(CompileError::Internal("resolved key missing from table"))
    }

    // ---- call graphs ------------------------------------------------------

    pub(crate) fn add_internal_call(&mut self, callee: FuncId) -> CompileResult<()> {
        let caller = self.current_func()?.clone();
        self.internal_calls.entry(caller).or_default().insert(callee);
        Ok(())
    }

    pub(crate) fn add_external_call(&mut self, type_id: TypeId, func: FuncId) -> CompileResult<()> {
        let caller = self.current_func()?.clone();
        self.external_calls
            .entry(caller)
            .or_default()
            .insert((type_id, func));
        Ok(())
    }

    pub(crate) fn internal_calls(&self) -> &IndexMap<FuncId, IndexSet<FuncId>> {
        &self.internal_calls
    }

    pub(crate) fn external_calls(&self) -> &IndexMap<FuncId, IndexSet<(TypeId, FuncId)>> {
        &self.external_calls
    }

    pub(crate) fn mark_permission_check(&mut self) -> CompileResult<()> {
        let func = self.current_func()?.name.clone();
        self.direct_permission_checks.insert(func);
        Ok(())
    }

    pub(crate) fn has_direct_permission_check(&self, func: &str) -> bool {
        self.direct_permission_checks.contains(func)
    }

    // ---- warnings ---------------------------------------------------------

    pub(crate) fn add_warning(&mut self, warning: String) {
        self.warnings.insert(warning);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.iter().cloned().collect()
    }

    /// Warns once per contract about locals that were declared, not marked
    /// unused, and never referenced. Generated temporaries are exempt.
    pub(crate) fn check_unused_local_vars(&mut self) {
        let unused: Vec<String> = self
            .var_table
            .iter()
            .filter(|(key, entry)| {
                key.contains('.')
                    && !entry.is_unused
                    && !entry.is_generated
                    && !self.used_vars.contains(*key)
                    && matches!(
                        entry.info,
                        VarInfo::Local { .. } | VarInfo::Array { ref_: ArrayRef { is_local: true, .. }, .. }
                    )
            })
            .map(|(key, _)| display_local_name(key))
            .collect();
        if !unused.is_empty() {
            self.add_warning(format!(
                "Found unused variables in {}: {}",
                self.type_id,
                unused.join(", ")
            ));
        }
    }

    /// Warns once per contract about fields never referenced by any method.
    pub(crate) fn check_unused_fields(&mut self) {
        let unused: Vec<String> = self
            .var_table
            .iter()
            .filter(|(key, entry)| {
                !key.contains('.')
                    && !entry.is_unused
                    && !self.used_vars.contains(*key)
                    && matches!(
                        entry.info,
                        VarInfo::Field { .. } | VarInfo::Array { ref_: ArrayRef { is_local: false, .. }, .. }
                    )
            })
            .map(|(key, _)| key.clone())
            .collect();
        if !unused.is_empty() {
            self.add_warning(format!(
                "Found unused fields in {}: {}",
                self.type_id,
                unused.join(", ")
            ));
        }
    }

    // ---- layout -----------------------------------------------------------

    /// Locals (arguments included) of a generated function; tight by
    /// construction since slots are assigned densely.
    pub(crate) fn locals_length(&self, func_name: &str) -> usize {
        self.func_scopes
            .get(func_name)
            .map_or(0, |scope| scope.var_index)
    }

    pub(crate) fn field_count(&self) -> usize {
        self.field_index
    }
}

/// `"bar#for0.i"` renders as `"bar.i"` in warnings.
fn display_local_name(key: &str) -> String {
    match key.split_once('.') {
        Some((scope, name)) => {
            let base = scope.split('#').next().unwrap_or(scope);
            format!("{}.{}", base, name)
        }
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    fn fresh<'a>(
        config: &'a CompilerConfig,
        registry: &'a ContractRegistry,
    ) -> CompilerState<'a> {
        let mut state = CompilerState::new(
            TypeId::new("C"),
            ContractKind::Contract,
            config,
            registry,
        );
        state.set_func_scope(&FuncId::new("f"));
        state
    }

    #[test]
    fn local_slots_are_dense_and_arrays_flatten() {
        let config = CompilerConfig::default();
        let registry = ContractRegistry::empty();
        let mut state = fresh(&config, &registry);
        state
            .add_local_variable(&Ident::new("a"), &Type::U256, false, false, false)
            .unwrap();
        state
            .add_local_variable(
                &Ident::new("xs"),
                &Type::array(Type::U256, 3),
                true,
                false,
                false,
            )
            .unwrap();
        state
            .add_local_variable(&Ident::new("b"), &Type::Bool, false, false, false)
            .unwrap();
        assert_eq!(state.locals_length("f"), 5);
        match state.get_variable(&Ident::new("b")).unwrap() {
            VarInfo::Local { index, .. } => assert_eq!(index, 4),
            other => panic!("unexpected info {:?}", other),
        }
    }

    #[test]
    fn shadowing_and_duplicates_are_rejected() {
        let config = CompilerConfig::default();
        let registry = ContractRegistry::empty();
        let mut state = fresh(&config, &registry);
        state
            .add_local_variable(&Ident::new("a"), &Type::U256, false, false, false)
            .unwrap();
        let err = state
            .add_local_variable(&Ident::new("a"), &Type::U256, false, false, false)
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::DuplicateVariable {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn for_scopes_free_the_name_after_exit() {
        let config = CompilerConfig::default();
        let registry = ContractRegistry::empty();
        let mut state = fresh(&config, &registry);
        state.enter_for_scope().unwrap();
        state
            .add_local_variable(&Ident::new("i"), &Type::U256, true, false, false)
            .unwrap();
        assert!(state.get_variable(&Ident::new("i")).is_ok());
        state.exit_for_scope().unwrap();
        assert!(state.get_variable(&Ident::new("i")).is_err());
        // A sibling loop may reuse the name in its own sub-scope.
        state.enter_for_scope().unwrap();
        state
            .add_local_variable(&Ident::new("i"), &Type::U256, true, false, false)
            .unwrap();
        state.exit_for_scope().unwrap();
        assert_eq!(state.locals_length("f"), 2);
    }

    #[test]
    fn unused_locals_warn_with_scoped_names() {
        let config = CompilerConfig::default();
        let registry = ContractRegistry::empty();
        let mut state = fresh(&config, &registry);
        state
            .add_local_variable(&Ident::new("seen"), &Type::U256, false, false, false)
            .unwrap();
        state
            .add_local_variable(&Ident::new("ignored"), &Type::U256, false, false, false)
            .unwrap();
        let _ = state.get_variable(&Ident::new("seen")).unwrap();
        state.check_unused_local_vars();
        assert_eq!(
            state.warnings(),
            vec!["Found unused variables in C: f.ignored".to_string()]
        );
    }

    #[test]
    fn warnings_deduplicate_but_keep_order() {
        let config = CompilerConfig::default();
        let registry = ContractRegistry::empty();
        let mut state = fresh(&config, &registry);
        state.add_warning("first".to_string());
        state.add_warning("second".to_string());
        state.add_warning("first".to_string());
        assert_eq!(state.warnings(), vec!["first", "second"]);
    }
}
