use helm_asm::Instr;
use helm_error::{CompileError, CompileResult};
use helm_types::{FuncId, Type};
use indexmap::IndexMap;
use lazy_static::lazy_static;

pub(crate) const CHECK_PERMISSION: &str = "checkPermission";
pub(crate) const PANIC: &str = "panic";

/// A VM intrinsic callable as `name!(...)`. Variadic built-ins additionally
/// receive their argument count as a trailing `U256` constant.
#[derive(Debug)]
pub(crate) struct BuiltInFunc {
    pub name: &'static str,
    pub arg_types: Vec<Type>,
    pub return_types: Vec<Type>,
    pub instrs: Vec<Instr>,
    pub is_variadic: bool,
}

impl BuiltInFunc {
    fn simple(name: &'static str, arg_types: Vec<Type>, return_types: Vec<Type>, instr: Instr) -> Self {
        BuiltInFunc {
            name,
            arg_types,
            return_types,
            instrs: vec![instr],
            is_variadic: false,
        }
    }
}

lazy_static! {
    pub(crate) static ref BUILT_IN_FUNCS: IndexMap<&'static str, BuiltInFunc> = {
        let funcs = vec![
            BuiltInFunc::simple(CHECK_PERMISSION, vec![Type::Bool], vec![], Instr::CheckPermission),
            BuiltInFunc::simple(PANIC, vec![], vec![], Instr::Panic),
            BuiltInFunc::simple(
                "approveAlph",
                vec![Type::Address, Type::U256],
                vec![],
                Instr::ApproveAlph,
            ),
            BuiltInFunc::simple(
                "approveToken",
                vec![Type::Address, Type::ByteVec, Type::U256],
                vec![],
                Instr::ApproveToken,
            ),
            BuiltInFunc::simple(
                "transferAlphFromSelf",
                vec![Type::Address, Type::U256],
                vec![],
                Instr::TransferAlphFromSelf,
            ),
            BuiltInFunc::simple(
                "transferAlphToSelf",
                vec![Type::Address, Type::U256],
                vec![],
                Instr::TransferAlphToSelf,
            ),
            BuiltInFunc::simple(
                "transferTokenFromSelf",
                vec![Type::Address, Type::ByteVec, Type::U256],
                vec![],
                Instr::TransferTokenFromSelf,
            ),
            BuiltInFunc::simple(
                "transferTokenToSelf",
                vec![Type::Address, Type::ByteVec, Type::U256],
                vec![],
                Instr::TransferTokenToSelf,
            ),
            BuiltInFunc::simple("selfAddress", vec![], vec![Type::Address], Instr::SelfAddress),
            BuiltInFunc::simple("destroySelf", vec![Type::Address], vec![], Instr::DestroySelf),
        ];
        funcs.into_iter().map(|func| (func.name, func)).collect()
    };
}

pub(crate) fn get_built_in(id: &FuncId) -> CompileResult<&'static BuiltInFunc> {
    BUILT_IN_FUNCS
        .get(id.name.as_str())
        .ok_or_else(|| CompileError::FunctionNotFound {
            name: id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_permission_is_a_known_built_in() {
        let func = get_built_in(&FuncId::built_in(CHECK_PERMISSION)).unwrap();
        assert_eq!(func.arg_types, vec![Type::Bool]);
        assert_eq!(func.instrs, vec![Instr::CheckPermission]);
    }

    #[test]
    fn unknown_built_ins_are_rejected_with_display_name() {
        let err = get_built_in(&FuncId::built_in("mint")).unwrap_err();
        assert_eq!(err.to_string(), "Function mint! does not exist");
    }
}
