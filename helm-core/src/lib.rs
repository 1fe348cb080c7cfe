//! The Helm contract compiler: takes the AST produced by the external
//! parser, runs semantic analysis and inheritance resolution, and emits
//! stack-machine bytecode containers for the platform VM.
//!
//! Compilation is synchronous and a pure function of the AST plus
//! [CompilerConfig]; every invocation owns its own
//! [semantic_analysis::CompilerState] instances, so separate compilations
//! may run on separate threads.

pub mod ast;
mod codegen;
mod config;
pub mod semantic_analysis;

pub use config::CompilerConfig;
pub use helm_asm::{Instr, Method, StatefulContract, StatefulScript, StatelessScript};
pub use helm_error::{CompileError, CompileResult};

use crate::ast::{AssetScript, Contract, Declaration, MultiContract, TxScript};
use crate::codegen::{gen_contract_code, gen_methods};
use crate::semantic_analysis::permission::{
    build_permission_table, check_interface_permissions, external_call_warnings,
};
use crate::semantic_analysis::{
    check_asset_script, check_contract, check_tx_script, CompilerState, ContractRegistry,
};
use helm_types::{ContractKind, TypeId};
use indexmap::IndexMap;
use tracing::debug;

/// Output of [compile_asset_script]: the stateless bytecode plus the ordered
/// warnings of the compilation.
#[derive(Debug, Clone)]
pub struct CompiledAssetScript {
    pub script: StatelessScript,
    pub warnings: Vec<String>,
}

/// Output of [MultiContract::compile_script]: bytecode, the
/// inheritance-expanded source AST, and the ordered warnings.
#[derive(Debug, Clone)]
pub struct CompiledTxScript {
    pub script: StatefulScript,
    pub ast: TxScript,
    pub warnings: Vec<String>,
}

/// Output of [MultiContract::compile_contract].
#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub contract: StatefulContract,
    pub ast: Contract,
    pub warnings: Vec<String>,
}

/// Compiles a standalone stateless asset script.
pub fn compile_asset_script(
    script: &AssetScript,
    config: &CompilerConfig,
) -> CompileResult<CompiledAssetScript> {
    debug!(script = %script.id, "compiling asset script");
    let registry = ContractRegistry::empty();
    let mut state = CompilerState::new(
        script.id.clone(),
        ContractKind::AssetScript,
        config,
        &registry,
    );
    check_asset_script(&mut state, script)?;
    let methods = gen_methods(&mut state, &script.funcs)?;
    Ok(CompiledAssetScript {
        script: StatelessScript { methods },
        warnings: state.warnings(),
    })
}

/// Checks and generates every contract of the (already extended) collection,
/// returning their states alongside their declaration indexes. The target
/// (when it is a contract) is generated first so its diagnostics surface
/// before the satellites compiled only for permission analysis.
fn analyse_contracts<'a>(
    extended: &'a MultiContract,
    registry: &'a ContractRegistry,
    config: &'a CompilerConfig,
    target_index: Option<usize>,
) -> CompileResult<(
    Vec<(usize, &'a Contract, CompilerState<'a>)>,
    IndexMap<usize, Vec<Method>>,
)> {
    let mut analysed: Vec<(usize, &Contract, CompilerState)> = Vec::new();
    for (index, declaration) in extended.declarations.iter().enumerate() {
        if let Declaration::Contract(contract) = declaration {
            let mut state = CompilerState::new(
                contract.id.clone(),
                contract.kind(),
                config,
                registry,
            );
            check_contract(&mut state, contract)?;
            analysed.push((index, contract, state));
        }
    }

    let mut methods: IndexMap<usize, Vec<Method>> = IndexMap::new();
    let mut order: Vec<usize> = (0..analysed.len()).collect();
    if let Some(target) = target_index {
        order.sort_by_key(|&pos| analysed[pos].0 != target);
    }
    for pos in order {
        let (index, contract, state) = &mut analysed[pos];
        if !contract.is_abstract {
            let generated = gen_contract_code(state, *contract)?;
            methods.insert(*index, generated);
        }
    }
    Ok((analysed, methods))
}

fn declaration_kinds(extended: &MultiContract) -> IndexMap<TypeId, ContractKind> {
    extended
        .declarations
        .iter()
        .map(|declaration| (declaration.id().clone(), declaration.kind()))
        .collect()
}

impl MultiContract {
    /// Compiles the transaction script at `index`, analysing the sibling
    /// contracts for external-call permission warnings.
    pub fn compile_script(
        &self,
        index: usize,
        config: &CompilerConfig,
    ) -> CompileResult<CompiledTxScript> {
        let extended = self.extended()?;
        let script = match extended.get(index)? {
            Declaration::TxScript(script) => script.clone(),
            other => {
                return Err(CompileError::UnexpectedDeclarationKind {
                    index,
                    expected: "TxScript",
                    got: other.kind().to_string(),
                })
            }
        };
        debug!(script = %script.id, index, "compiling transaction script");

        let registry = ContractRegistry::from_declarations(&extended.declarations)?;
        let mut state = CompilerState::new(
            script.id.clone(),
            ContractKind::TxScript,
            config,
            &registry,
        );
        check_tx_script(&mut state, &script)?;
        let methods = gen_methods(&mut state, &script.funcs)?;
        let visibility_ok = methods
            .split_first()
            .map_or(false, |(first, rest)| {
                first.is_public && rest.iter().all(|method| !method.is_public)
            });
        if !visibility_ok {
            return Err(CompileError::InvalidScriptMethodVisibility {
                name: script.id.to_string(),
            });
        }

        let (analysed, _) = analyse_contracts(&extended, &registry, config, None)?;
        let tables: IndexMap<TypeId, _> = analysed
            .iter()
            .map(|(_, contract, contract_state)| {
                (contract.id.clone(), build_permission_table(contract_state))
            })
            .collect();
        for warning in external_call_warnings(&state, &tables, &declaration_kinds(&extended)) {
            state.add_warning(warning);
        }

        Ok(CompiledTxScript {
            script: StatefulScript { methods },
            ast: script,
            warnings: state.warnings(),
        })
    }

    /// Compiles the contract at `index`. Every other non-abstract contract
    /// of the collection is generated as well, solely to populate the call
    /// graphs the permission analysis reads.
    pub fn compile_contract(
        &self,
        index: usize,
        config: &CompilerConfig,
    ) -> CompileResult<CompiledContract> {
        let extended = self.extended()?;
        let target = match extended.get(index)? {
            Declaration::Contract(contract) if !contract.is_abstract => contract.clone(),
            Declaration::Contract(contract) => {
                return Err(CompileError::CompileAbstractContract {
                    name: contract.id.to_string(),
                })
            }
            other => {
                return Err(CompileError::UnexpectedDeclarationKind {
                    index,
                    expected: "Contract",
                    got: other.kind().to_string(),
                })
            }
        };
        debug!(contract = %target.id, index, "compiling contract");

        let registry = ContractRegistry::from_declarations(&extended.declarations)?;
        let (mut analysed, mut methods) =
            analyse_contracts(&extended, &registry, config, Some(index))?;

        let tables: IndexMap<TypeId, _> = analysed
            .iter()
            .map(|(_, contract, contract_state)| {
                (contract.id.clone(), build_permission_table(contract_state))
            })
            .collect();

        let target_pos = analysed
            .iter()
            .position(|(declaration_index, _, _)| *declaration_index == index)
            .ok_or(CompileError::Internal("target contract missing from analysis"))?;
        let target_table = tables
            .get(&target.id)
            .ok_or(CompileError::Internal("target permission table missing"))?;
        check_interface_permissions(&target, target_table)?;

        let warnings = external_call_warnings(
            &analysed[target_pos].2,
            &tables,
            &declaration_kinds(&extended),
        );
        let target_state = &mut analysed[target_pos].2;
        for warning in warnings {
            target_state.add_warning(warning);
        }

        let target_methods = methods
            .swap_remove(&index)
            .ok_or(CompileError::Internal("target contract was not generated"))?;
        Ok(CompiledContract {
            contract: StatefulContract {
                field_length: target_state.field_count(),
                methods: target_methods,
            },
            ast: target,
            warnings: target_state.warnings(),
        })
    }

    /// Compiles the asset script at `index`.
    pub fn compile_asset_script(
        &self,
        index: usize,
        config: &CompilerConfig,
    ) -> CompileResult<CompiledAssetScript> {
        match self.get(index)? {
            Declaration::AssetScript(script) => compile_asset_script(script, config),
            other => Err(CompileError::UnexpectedDeclarationKind {
                index,
                expected: "AssetScript",
                got: other.kind().to_string(),
            }),
        }
    }
}
