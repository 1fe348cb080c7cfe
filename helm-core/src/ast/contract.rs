use crate::ast::declaration::{
    format_fields, Argument, ConstantVarDef, ContractInheritance, EnumDef, EventDef, FuncDef,
    Inheritance,
};
use helm_error::{CompileError, CompileResult};
use helm_types::{ContractKind, TypeId};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use tracing::trace;

/// A stateless script: template variables and functions only. Compiles to a
/// [helm_asm::StatelessScript].
#[derive(Debug, Clone)]
pub struct AssetScript {
    pub id: TypeId,
    pub template_vars: Vec<Argument>,
    pub funcs: Vec<FuncDef>,
}

/// A stateful transaction script: template variables and functions, no
/// fields, constants, enums, events, or inheritance.
#[derive(Debug, Clone)]
pub struct TxScript {
    pub id: TypeId,
    pub template_vars: Vec<Argument>,
    pub funcs: Vec<FuncDef>,
}

/// A deployable (or abstract) contract.
#[derive(Debug, Clone)]
pub struct Contract {
    pub is_abstract: bool,
    pub id: TypeId,
    pub template_vars: Vec<Argument>,
    pub fields: Vec<Argument>,
    pub funcs: Vec<FuncDef>,
    pub events: Vec<EventDef>,
    pub constants: Vec<ConstantVarDef>,
    pub enums: Vec<EnumDef>,
    pub inheritances: Vec<Inheritance>,
    /// Number of leading functions contributed by inherited interfaces after
    /// expansion. Zero on parser-produced contracts.
    pub(crate) inherited_interface_func_count: usize,
}

impl Contract {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        is_abstract: bool,
        id: impl Into<String>,
        template_vars: Vec<Argument>,
        fields: Vec<Argument>,
        funcs: Vec<FuncDef>,
        events: Vec<EventDef>,
        constants: Vec<ConstantVarDef>,
        enums: Vec<EnumDef>,
        inheritances: Vec<Inheritance>,
    ) -> Self {
        Contract {
            is_abstract,
            id: TypeId::new(id),
            template_vars,
            fields,
            funcs,
            events,
            constants,
            enums,
            inheritances,
            inherited_interface_func_count: 0,
        }
    }

    pub fn kind(&self) -> ContractKind {
        if self.is_abstract {
            ContractKind::AbstractContract
        } else {
            ContractKind::Contract
        }
    }
}

/// An interface: abstract functions and events, inheriting only from other
/// interfaces.
#[derive(Debug, Clone)]
pub struct ContractInterface {
    pub id: TypeId,
    pub funcs: Vec<FuncDef>,
    pub events: Vec<EventDef>,
    pub inheritances: Vec<crate::ast::InterfaceInheritance>,
}

/// One top-level declaration of a [MultiContract].
#[derive(Debug, Clone)]
pub enum Declaration {
    AssetScript(AssetScript),
    TxScript(TxScript),
    Contract(Contract),
    Interface(ContractInterface),
}

impl Declaration {
    pub fn id(&self) -> &TypeId {
        match self {
            Declaration::AssetScript(script) => &script.id,
            Declaration::TxScript(script) => &script.id,
            Declaration::Contract(contract) => &contract.id,
            Declaration::Interface(interface) => &interface.id,
        }
    }

    pub fn kind(&self) -> ContractKind {
        match self {
            Declaration::AssetScript(_) => ContractKind::AssetScript,
            Declaration::TxScript(_) => ContractKind::TxScript,
            Declaration::Contract(contract) => contract.kind(),
            Declaration::Interface(_) => ContractKind::Interface,
        }
    }
}

/// The ordered collection of top-level declarations compiled together.
#[derive(Debug, Clone)]
pub struct MultiContract {
    pub declarations: Vec<Declaration>,
}

impl MultiContract {
    pub fn new(declarations: Vec<Declaration>) -> CompileResult<Self> {
        let mut seen: IndexSet<&TypeId> = IndexSet::new();
        let duplicated: Vec<String> = declarations
            .iter()
            .map(Declaration::id)
            .filter(|id| !seen.insert(*id))
            .map(TypeId::to_string)
            .collect();
        if !duplicated.is_empty() {
            return Err(CompileError::DuplicateContracts {
                names: duplicated.into_iter().unique().join(", "),
            });
        }
        Ok(MultiContract { declarations })
    }

    pub fn get(&self, index: usize) -> CompileResult<&Declaration> {
        self.declarations
            .get(index)
            .ok_or(CompileError::InvalidContractIndex { index })
    }

    /// Resolves inheritance for every contract and interface, producing a
    /// [MultiContract] in which each declaration carries its merged
    /// functions, events, constants, and enums. Scripts pass through
    /// unchanged. The inheritance graph must be a DAG.
    pub fn extended(&self) -> CompileResult<MultiContract> {
        let by_id: IndexMap<&TypeId, &Declaration> = self
            .declarations
            .iter()
            .map(|decl| (decl.id(), decl))
            .collect();

        let mut parents: IndexMap<TypeId, Vec<TypeId>> = IndexMap::new();
        let mut visiting: IndexSet<TypeId> = IndexSet::new();
        for decl in &self.declarations {
            if matches!(decl, Declaration::Contract(_) | Declaration::Interface(_)) {
                resolve_parents(decl, &by_id, &mut parents, &mut visiting)?;
            }
        }

        let declarations = self
            .declarations
            .iter()
            .map(|decl| match decl {
                Declaration::AssetScript(_) | Declaration::TxScript(_) => Ok(decl.clone()),
                Declaration::Contract(contract) => {
                    extend_contract(contract, &by_id, &parents).map(Declaration::Contract)
                }
                Declaration::Interface(interface) => {
                    extend_interface(interface, &by_id, &parents).map(Declaration::Interface)
                }
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(MultiContract { declarations })
    }
}

fn direct_parents(decl: &Declaration) -> Vec<&TypeId> {
    match decl {
        Declaration::Contract(contract) => {
            contract.inheritances.iter().map(Inheritance::parent).collect()
        }
        Declaration::Interface(interface) => {
            interface.inheritances.iter().map(|inh| &inh.parent).collect()
        }
        _ => Vec::new(),
    }
}

/// Depth-first ancestor collection with a visiting set for cycle detection.
/// The result is memoised per type and deduplicated in first-visit order.
fn resolve_parents(
    decl: &Declaration,
    by_id: &IndexMap<&TypeId, &Declaration>,
    parents: &mut IndexMap<TypeId, Vec<TypeId>>,
    visiting: &mut IndexSet<TypeId>,
) -> CompileResult<Vec<TypeId>> {
    let id = decl.id();
    if let Some(cached) = parents.get(id) {
        return Ok(cached.clone());
    }
    if !visiting.insert(id.clone()) {
        return Err(CompileError::CyclicInheritance {
            name: id.to_string(),
        });
    }

    let mut ancestors: Vec<TypeId> = Vec::new();
    for parent_id in direct_parents(decl) {
        let parent = by_id
            .get(parent_id)
            .ok_or_else(|| CompileError::ContractNotFound {
                name: parent_id.to_string(),
            })?;
        let child_is_interface = matches!(decl, Declaration::Interface(_));
        let invalid_parent = !parent.kind().is_inheritable()
            || (child_is_interface && !matches!(parent, Declaration::Interface(_)));
        if invalid_parent {
            return Err(CompileError::NotInheritable {
                parent: parent_id.to_string(),
                child: id.to_string(),
            });
        }
        ancestors.push(parent_id.clone());
        ancestors.extend(resolve_parents(parent, by_id, parents, visiting)?);
    }

    visiting.swap_remove(id);
    let ancestors: Vec<TypeId> = ancestors.into_iter().unique().collect();
    trace!(contract = %id, ancestors = ?ancestors, "resolved inheritance");
    parents.insert(id.clone(), ancestors.clone());
    Ok(ancestors)
}

/// Interface ancestors of `id`, stably ordered by ancestor count (fewest
/// first) so shallow parents contribute their methods earlier.
fn sorted_interface_ancestors(
    id: &TypeId,
    by_id: &IndexMap<&TypeId, &Declaration>,
    parents: &IndexMap<TypeId, Vec<TypeId>>,
) -> Vec<TypeId> {
    let mut interfaces: Vec<TypeId> = parents
        .get(id)
        .into_iter()
        .flatten()
        .filter(|ancestor| matches!(by_id.get(ancestor), Some(Declaration::Interface(_))))
        .cloned()
        .collect();
    interfaces.sort_by_key(|ancestor| parents.get(ancestor).map_or(0, Vec::len));
    interfaces
}

/// Verifies that the fields listed in a `ContractInheritance` name fields of
/// the child whose names, types, and mutability match the parent's field
/// list exactly, in order.
fn check_inheritance_fields(
    child: &Contract,
    inheritance: &ContractInheritance,
    parent: &Contract,
) -> CompileResult<()> {
    let selected: Vec<&Argument> = inheritance
        .idents
        .iter()
        .filter_map(|ident| child.fields.iter().find(|field| &field.ident == ident))
        .collect();
    let matches = selected.len() == inheritance.idents.len()
        && selected.len() == parent.fields.len()
        && selected
            .iter()
            .zip(parent.fields.iter())
            .all(|(have, expect)| {
                have.ident == expect.ident
                    && have.tpe == expect.tpe
                    && have.is_mutable == expect.is_mutable
            });
    if !matches {
        return Err(CompileError::InvalidInheritanceFields {
            expected: format_fields(&parent.fields),
            have: inheritance.idents.iter().join(", "),
        });
    }
    Ok(())
}

/// Merges inherited and own functions by name. An abstract declaration and
/// its implementation collapse into the implementation at the abstract
/// declaration's position; any other name collision is an error.
fn merge_funcs(all: Vec<FuncDef>) -> CompileResult<IndexMap<String, FuncDef>> {
    let mut merged: IndexMap<String, FuncDef> = IndexMap::new();
    let mut duplicated: Vec<String> = Vec::new();
    for func in all {
        let name = func.id.name.clone();
        match merged.get_mut(&name) {
            None => {
                merged.insert(name, func);
            }
            Some(existing) => {
                if existing.is_abstract() != func.is_abstract() {
                    if !existing.signature_eq(&func) {
                        return Err(CompileError::WrongImplementationSignature { func: name });
                    }
                    if existing.is_abstract() {
                        *existing = func;
                    }
                } else {
                    duplicated.push(name);
                }
            }
        }
    }
    if !duplicated.is_empty() {
        return Err(CompileError::DuplicateFunctions {
            names: duplicated.into_iter().unique().join(", "),
        });
    }
    Ok(merged)
}

fn extend_contract(
    contract: &Contract,
    by_id: &IndexMap<&TypeId, &Declaration>,
    parents: &IndexMap<TypeId, Vec<TypeId>>,
) -> CompileResult<Contract> {
    for inheritance in &contract.inheritances {
        if let Inheritance::Contract(contract_inh) = inheritance {
            match by_id.get(&contract_inh.parent) {
                Some(Declaration::Contract(parent)) => {
                    check_inheritance_fields(contract, contract_inh, parent)?
                }
                _ => {
                    return Err(CompileError::NotInheritable {
                        parent: contract_inh.parent.to_string(),
                        child: contract.id.to_string(),
                    })
                }
            }
        }
    }

    let interface_ids = sorted_interface_ancestors(&contract.id, by_id, parents);
    let contract_ids: Vec<&TypeId> = parents
        .get(&contract.id)
        .into_iter()
        .flatten()
        .filter(|ancestor| matches!(by_id.get(ancestor), Some(Declaration::Contract(_))))
        .collect();

    let mut funcs: Vec<FuncDef> = Vec::new();
    let mut events: Vec<EventDef> = Vec::new();
    let mut constants: Vec<ConstantVarDef> = Vec::new();
    let mut enums: Vec<EnumDef> = Vec::new();

    for interface_id in &interface_ids {
        if let Some(Declaration::Interface(interface)) = by_id.get(interface_id) {
            funcs.extend(interface.funcs.iter().cloned());
            events.extend(interface.events.iter().cloned());
        }
    }
    let inherited_interface_func_count = funcs.len();

    for contract_id in &contract_ids {
        if let Some(Declaration::Contract(parent)) = by_id.get(*contract_id) {
            funcs.extend(parent.funcs.iter().cloned());
            events.extend(parent.events.iter().cloned());
            constants.extend(parent.constants.iter().cloned());
            enums.extend(parent.enums.iter().cloned());
        }
    }

    funcs.extend(contract.funcs.iter().cloned());
    events.extend(contract.events.iter().cloned());
    constants.extend(contract.constants.iter().cloned());
    enums.extend(contract.enums.iter().cloned());

    let merged = merge_funcs(funcs)?;
    if !contract.is_abstract {
        let unimplemented: Vec<&String> = merged
            .iter()
            .filter(|(_, func)| func.is_abstract())
            .map(|(name, _)| name)
            .collect();
        if !unimplemented.is_empty() {
            return Err(CompileError::UnimplementedMethods {
                name: contract.id.to_string(),
                methods: unimplemented.into_iter().join(", "),
            });
        }
    }

    Ok(Contract {
        is_abstract: contract.is_abstract,
        id: contract.id.clone(),
        template_vars: contract.template_vars.clone(),
        fields: contract.fields.clone(),
        funcs: merged.into_values().collect(),
        events,
        constants,
        enums,
        inheritances: contract.inheritances.clone(),
        inherited_interface_func_count,
    })
}

fn extend_interface(
    interface: &ContractInterface,
    by_id: &IndexMap<&TypeId, &Declaration>,
    parents: &IndexMap<TypeId, Vec<TypeId>>,
) -> CompileResult<ContractInterface> {
    let implemented: Vec<&str> = interface
        .funcs
        .iter()
        .filter(|func| !func.is_abstract())
        .map(|func| func.id.name.as_str())
        .collect();
    if !implemented.is_empty() {
        return Err(CompileError::InterfaceWithImplementedMethods {
            name: interface.id.to_string(),
            methods: implemented.into_iter().join(", "),
        });
    }

    let mut funcs: Vec<FuncDef> = Vec::new();
    let mut events: Vec<EventDef> = Vec::new();
    for ancestor in sorted_interface_ancestors(&interface.id, by_id, parents) {
        if let Some(Declaration::Interface(parent)) = by_id.get(&ancestor) {
            funcs.extend(parent.funcs.iter().cloned());
            events.extend(parent.events.iter().cloned());
        }
    }
    funcs.extend(interface.funcs.iter().cloned());
    events.extend(interface.events.iter().cloned());
    let merged = merge_funcs(funcs)?;

    Ok(ContractInterface {
        id: interface.id.clone(),
        funcs: merged.into_values().collect(),
        events,
        inheritances: interface.inheritances.clone(),
    })
}
