//! Static permission-check analysis. A function counts as checked when it
//! opts out (`use_permission_check = false`), contains a direct
//! `checkPermission!` call, or (for private callees) transitively reaches
//! one. The table is a fixed point of backward propagation over the internal
//! call graph and does not depend on traversal order.

use crate::ast::Contract;
use crate::semantic_analysis::CompilerState;
use helm_error::{CompileError, CompileResult};
use helm_types::ContractKind;
use indexmap::IndexMap;
use std::collections::HashMap;

/// `checked[f]` for every function of the unit behind `state`.
pub(crate) fn build_permission_table(state: &CompilerState) -> IndexMap<String, bool> {
    let mut table: IndexMap<String, bool> = state
        .func_infos()
        .keys()
        .map(|name| (name.clone(), false))
        .collect();

    let mut callers_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for (caller, callees) in state.internal_calls() {
        for callee in callees {
            callers_of
                .entry(callee.name.as_str())
                .or_default()
                .push(caller.name.as_str());
        }
    }

    for (name, info) in state.func_infos() {
        let direct = !info.use_permission_check || state.has_direct_permission_check(name);
        if direct {
            mark(name, state, &callers_of, &mut table);
        }
    }
    table
}

/// Marks `name` checked and propagates to its callers. Propagation continues
/// only through private functions: a caller of a public function cannot be
/// presumed checked by it.
fn mark(
    name: &str,
    state: &CompilerState,
    callers_of: &HashMap<&str, Vec<&str>>,
    table: &mut IndexMap<String, bool>,
) {
    match table.get_mut(name) {
        Some(checked) if !*checked => *checked = true,
        _ => return,
    }
    if state.func_is_public(name) {
        return;
    }
    if let Some(callers) = callers_of.get(name) {
        for caller in callers {
            mark(caller, state, callers_of, table);
        }
    }
}

/// The interface-implementation rule: every inherited interface method that
/// asked for a permission check must end up checked, else compilation fails.
pub(crate) fn check_interface_permissions(
    contract: &Contract,
    table: &IndexMap<String, bool>,
) -> CompileResult<()> {
    for func in contract
        .funcs
        .iter()
        .take(contract.inherited_interface_func_count)
    {
        let checked = table.get(&func.id.name).copied().unwrap_or(false);
        if func.use_permission_check && !checked {
            return Err(CompileError::NoPermissionCheck {
                type_id: contract.id.to_string(),
                func: func.id.name.clone(),
            });
        }
    }
    Ok(())
}

/// Warnings for external calls whose callee is never permission-checked.
/// Only direct callees are analysed; interface callees are treated as always
/// checked since their implementations are unknown here.
pub(crate) fn external_call_warnings(
    target: &CompilerState,
    tables: &IndexMap<helm_types::TypeId, IndexMap<String, bool>>,
    kinds: &IndexMap<helm_types::TypeId, ContractKind>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for callees in target.external_calls().values() {
        for (type_id, func) in callees {
            if kinds.get(type_id) == Some(&ContractKind::Interface) {
                continue;
            }
            let checked = tables
                .get(type_id)
                .and_then(|table| table.get(&func.name))
                .copied()
                .unwrap_or(false);
            if !checked {
                warnings.push(format!(
                    "No permission check for function: {}.{}, please use checkPermission!(...) for the function or its private callees",
                    type_id, func.name
                ));
            }
        }
    }
    warnings
}
