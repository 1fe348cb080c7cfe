//! Bottom-up instruction emission. Every sub-expression leaves its
//! flattened-length cells on the stack in declaration order; statements
//! consume what their expressions produce.

mod expression;
mod statement;

pub(crate) use expression::gen_expression;
pub(crate) use statement::gen_statement;

use crate::ast::{Contract, Expr, ExprKind, FuncDef};
use crate::semantic_analysis::array_ref::{ArrayOffset, ArrayRef};
use crate::semantic_analysis::{CompilerState, VarInfo};
use helm_asm::{Instr, Method, ToConstInstr};
use helm_error::{CompileError, CompileResult};
use helm_types::{flattened_types_length, Ident, Type, Val};

fn cell_index(cell: usize) -> CompileResult<u8> {
    u8::try_from(cell).map_err(|_| CompileError::Internal("cell index out of slot range"))
}

fn static_load(array: &ArrayRef, cell: usize) -> CompileResult<Instr> {
    let index = cell_index(cell)?;
    Ok(if array.is_local {
        Instr::LoadLocal(index)
    } else if array.is_mutable {
        Instr::LoadField(index)
    } else {
        Instr::LoadImmField(index)
    })
}

fn static_store(array: &ArrayRef, cell: usize) -> CompileResult<Instr> {
    let index = cell_index(cell)?;
    Ok(if array.is_local {
        Instr::StoreLocal(index)
    } else {
        Instr::StoreField(index)
    })
}

fn by_index_load(array: &ArrayRef) -> Instr {
    if array.is_local {
        Instr::LoadLocalByIndex
    } else if array.is_mutable {
        Instr::LoadFieldByIndex
    } else {
        Instr::LoadImmFieldByIndex
    }
}

fn by_index_store(array: &ArrayRef) -> Instr {
    if array.is_local {
        Instr::StoreLocalByIndex
    } else {
        Instr::StoreFieldByIndex
    }
}

/// Loads every cell of an array in ascending order. A runtime offset is
/// computed once into the per-function scratch local so side effects in the
/// index expression happen exactly once.
pub(crate) fn gen_array_loads(
    state: &mut CompilerState,
    array: &ArrayRef,
) -> CompileResult<Vec<Instr>> {
    let len = array.flattened_length();
    match &array.offset {
        ArrayOffset::Constant(base) => {
            (0..len).map(|i| static_load(array, base + i)).collect()
        }
        ArrayOffset::Runtime(code) => {
            let scratch = state.array_index_var()?;
            let mut out = code.clone();
            out.push(Instr::StoreLocal(scratch));
            for i in 0..len {
                out.push(Instr::LoadLocal(scratch));
                if i > 0 {
                    out.push(Val::u256(i as u64).to_const_instr());
                    out.push(Instr::U256Add);
                }
                out.push(by_index_load(array));
            }
            Ok(out)
        }
    }
}

/// Per-cell store sequences in cell order, plus a prelude computing a
/// runtime offset. The caller emits the prelude, then the cells in reverse,
/// matching the stack layout left by the right-hand side.
pub(crate) fn gen_array_stores(
    state: &mut CompilerState,
    array: &ArrayRef,
) -> CompileResult<(Vec<Instr>, Vec<Vec<Instr>>)> {
    let len = array.flattened_length();
    match &array.offset {
        ArrayOffset::Constant(base) => {
            let cells = (0..len)
                .map(|i| Ok(vec![static_store(array, base + i)?]))
                .collect::<CompileResult<Vec<_>>>()?;
            Ok((Vec::new(), cells))
        }
        ArrayOffset::Runtime(code) => {
            let scratch = state.array_index_var()?;
            let mut prelude = code.clone();
            prelude.push(Instr::StoreLocal(scratch));
            let cells = (0..len)
                .map(|i| {
                    let mut cell = vec![Instr::LoadLocal(scratch)];
                    if i > 0 {
                        cell.push(Val::u256(i as u64).to_const_instr());
                        cell.push(Instr::U256Add);
                    }
                    cell.push(by_index_store(array));
                    cell
                })
                .collect();
            Ok((prelude, cells))
        }
    }
}

/// Emission for loading a whole variable, per storage class.
pub(crate) fn gen_load_code(state: &mut CompilerState, ident: &Ident) -> CompileResult<Vec<Instr>> {
    match state.get_variable(ident)? {
        VarInfo::Local { index, .. } => Ok(vec![Instr::LoadLocal(index)]),
        VarInfo::Field {
            index, is_mutable, ..
        } => Ok(vec![if is_mutable {
            Instr::LoadField(index)
        } else {
            Instr::LoadImmField(index)
        }]),
        VarInfo::Template { index, .. } => Ok(vec![Instr::LoadTemplate(index)]),
        VarInfo::Constant { instrs, .. } => Ok(instrs),
        VarInfo::Array { ref_, .. } => gen_array_loads(state, &ref_),
    }
}

/// Store emission for a whole variable: (prelude, per-cell sequences).
pub(crate) fn gen_store_code(
    state: &mut CompilerState,
    ident: &Ident,
) -> CompileResult<(Vec<Instr>, Vec<Vec<Instr>>)> {
    match state.get_variable(ident)? {
        VarInfo::Local { index, .. } => Ok((Vec::new(), vec![vec![Instr::StoreLocal(index)]])),
        VarInfo::Field {
            index, is_mutable, ..
        } => {
            if !is_mutable {
                return Err(CompileError::AssignToImmutable {
                    name: ident.to_string(),
                });
            }
            Ok((Vec::new(), vec![vec![Instr::StoreField(index)]]))
        }
        VarInfo::Template { .. } | VarInfo::Constant { .. } => {
            Err(CompileError::AssignToImmutable {
                name: ident.to_string(),
            })
        }
        VarInfo::Array {
            ref_, is_mutable, ..
        } => {
            if !is_mutable {
                return Err(CompileError::AssignToImmutable {
                    name: ident.to_string(),
                });
            }
            gen_array_stores(state, &ref_)
        }
    }
}

/// Folds an index sequence into the flat cell offset of the addressed
/// element (or sub-array), constant-folding wherever the index is a literal.
pub(crate) fn fold_offset(
    state: &mut CompilerState,
    base: &ArrayRef,
    indexes: &[Expr],
) -> CompileResult<(ArrayOffset, Type)> {
    let mut offset = base.offset.clone();
    let mut current = base.tpe.clone();
    for index in indexes {
        let (elem, size) = match current {
            Type::FixedSizeArray { elem, size } => (*elem, size),
            other => {
                return Err(CompileError::ExpectArrayType {
                    found: other.to_string(),
                })
            }
        };
        let stride = elem.flattened_length();
        match index.as_const_u256() {
            Some(value) => {
                if value >= helm_types::U256::from(size as u64) {
                    return Err(CompileError::InvalidArrayIndex {
                        index: value.to_string(),
                    });
                }
                offset = offset.add_constant(value.low_u64() as usize * stride);
            }
            None => {
                let mut code = gen_expression(state, index)?;
                if stride > 1 {
                    code.push(Val::u256(stride as u64).to_const_instr());
                    code.push(Instr::U256Mul);
                }
                offset = offset.add_runtime(code);
            }
        }
        current = elem;
    }
    Ok((offset, current))
}

/// Creates or retrieves the [ArrayRef] backing an array-valued expression.
/// Named arrays and sub-arrays resolve to their existing cells; any other
/// array expression is materialised into generated temporaries, with the
/// returned prelude performing the materialisation.
pub(crate) fn get_or_create_array_ref(
    state: &mut CompilerState,
    expr: &Expr,
) -> CompileResult<(Vec<Instr>, ArrayRef)> {
    match &expr.kind {
        ExprKind::Variable(ident) => match state.get_variable(ident)? {
            VarInfo::Array { ref_, .. } => Ok((Vec::new(), ref_)),
            other => Err(CompileError::ExpectArrayType {
                found: other.tpe().to_string(),
            }),
        },
        ExprKind::Paren(inner) => get_or_create_array_ref(state, inner),
        ExprKind::ArrayElement { array, indexes } => {
            let (prelude, base) = get_or_create_array_ref(state, array)?;
            let (offset, tpe) = fold_offset(state, &base, indexes)?;
            if !tpe.is_array() {
                return Err(CompileError::ExpectArrayType {
                    found: tpe.to_string(),
                });
            }
            Ok((
                prelude,
                ArrayRef {
                    is_local: base.is_local,
                    is_mutable: base.is_mutable,
                    tpe,
                    offset,
                },
            ))
        }
        _ => {
            let tpe = expr.single_type(state)?;
            if !tpe.is_array() {
                return Err(CompileError::ExpectArrayType {
                    found: tpe.to_string(),
                });
            }
            let array = state.fresh_array_temp(&tpe)?;
            let mut prelude = gen_expression(state, expr)?;
            let (store_prelude, cells) = gen_array_stores(state, &array)?;
            prelude.extend(store_prelude);
            for cell in cells.into_iter().rev() {
                prelude.extend(cell);
            }
            Ok((prelude, array))
        }
    }
}

/// Assembles one function into a [Method]. Locals are read back after the
/// body is generated since materialised temporaries extend the allocation.
pub(crate) fn gen_method(state: &mut CompilerState, func: &FuncDef) -> CompileResult<Method> {
    state.set_func_scope(&func.id);
    let body = func
        .body
        .as_ref()
        .ok_or(CompileError::Internal("generating an abstract function"))?;
    let mut instrs = Vec::new();
    for stmt in body {
        instrs.extend(gen_statement(state, stmt)?);
    }
    if func.return_types.is_empty() && instrs.last() != Some(&Instr::Return) {
        instrs.push(Instr::Return);
    }
    Ok(Method {
        is_public: func.is_public,
        use_preapproved_assets: func.use_preapproved_assets,
        use_assets_in_contract: func.use_assets_in_contract,
        args_length: flattened_types_length(&func.arg_types()),
        locals_length: state.locals_length(&func.id.name),
        return_length: flattened_types_length(&func.return_types),
        instrs,
    })
}

pub(crate) fn gen_methods(state: &mut CompilerState, funcs: &[FuncDef]) -> CompileResult<Vec<Method>> {
    funcs.iter().map(|func| gen_method(state, func)).collect()
}

pub(crate) fn gen_contract_code(
    state: &mut CompilerState,
    contract: &Contract,
) -> CompileResult<Vec<Method>> {
    gen_methods(state, &contract.funcs)
}
