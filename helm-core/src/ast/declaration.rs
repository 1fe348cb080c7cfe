use crate::ast::Statement;
use helm_types::{FuncId, Ident, Type, TypeId, Val};
use itertools::Itertools;

/// A formal argument, template variable, or contract field.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub ident: Ident,
    pub tpe: Type,
    pub is_mutable: bool,
    /// Declared as intentionally unused; suppresses the unused warning.
    pub is_unused: bool,
}

impl Argument {
    pub fn new(ident: impl Into<String>, tpe: Type) -> Self {
        Argument {
            ident: Ident::new(ident),
            tpe,
            is_mutable: false,
            is_unused: false,
        }
    }

    pub fn mutable(ident: impl Into<String>, tpe: Type) -> Self {
        Argument {
            ident: Ident::new(ident),
            tpe,
            is_mutable: true,
            is_unused: false,
        }
    }

    pub(crate) fn signature(&self) -> String {
        let prefix = if self.is_mutable { "mut " } else { "" };
        format!("{}{}: {}", prefix, self.ident, self.tpe)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventField {
    pub ident: Ident,
    pub tpe: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationField {
    pub ident: Ident,
    pub value: Val,
}

/// A parsed `@id(field = value, ...)` annotation. The parser resolves the
/// recognised annotations into the capability flags on [FuncDef]; the raw
/// annotations are retained for tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: Ident,
    pub fields: Vec<AnnotationField>,
}

/// A function definition. An absent body marks the function abstract.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub annotations: Vec<Annotation>,
    pub id: FuncId,
    pub is_public: bool,
    pub use_preapproved_assets: bool,
    pub use_assets_in_contract: bool,
    pub use_permission_check: bool,
    pub args: Vec<Argument>,
    pub return_types: Vec<Type>,
    pub body: Option<Vec<Statement>>,
}

impl FuncDef {
    pub fn new(
        id: impl Into<String>,
        is_public: bool,
        args: Vec<Argument>,
        return_types: Vec<Type>,
        body: Vec<Statement>,
    ) -> Self {
        FuncDef {
            annotations: Vec::new(),
            id: FuncId::new(id),
            is_public,
            use_preapproved_assets: false,
            use_assets_in_contract: false,
            use_permission_check: true,
            args,
            return_types,
            body: Some(body),
        }
    }

    pub fn is_abstract(&self) -> bool {
        self.body.is_none()
    }

    pub fn arg_types(&self) -> Vec<Type> {
        self.args.iter().map(|arg| arg.tpe.clone()).collect()
    }

    /// Signature equality modulo body and annotations, used when merging an
    /// implementation with its abstract declaration.
    pub(crate) fn signature_eq(&self, other: &FuncDef) -> bool {
        self.id == other.id
            && self.is_public == other.is_public
            && self.use_preapproved_assets == other.use_preapproved_assets
            && self.use_assets_in_contract == other.use_assets_in_contract
            && self.use_permission_check == other.use_permission_check
            && self.args == other.args
            && self.return_types == other.return_types
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDef {
    pub id: TypeId,
    pub fields: Vec<EventField>,
}

impl EventDef {
    pub fn new(id: impl Into<String>, fields: Vec<(&str, Type)>) -> Self {
        EventDef {
            id: TypeId::new(id),
            fields: fields
                .into_iter()
                .map(|(ident, tpe)| EventField {
                    ident: Ident::new(ident),
                    tpe,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantVarDef {
    pub ident: Ident,
    pub value: Val,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumField {
    pub ident: Ident,
    pub value: Val,
}

/// Enum fields live in a flat constant namespace keyed `"EnumName.FieldName"`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub id: TypeId,
    pub fields: Vec<EnumField>,
}

/// `extends Parent(field, ...)`: the listed idents name fields of the child
/// that mirror the parent's field list.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractInheritance {
    pub parent: TypeId,
    pub idents: Vec<Ident>,
}

/// `implements Parent`: interface inheritance carries no fields.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInheritance {
    pub parent: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inheritance {
    Contract(ContractInheritance),
    Interface(InterfaceInheritance),
}

impl Inheritance {
    pub fn parent(&self) -> &TypeId {
        match self {
            Inheritance::Contract(inh) => &inh.parent,
            Inheritance::Interface(inh) => &inh.parent,
        }
    }
}

pub(crate) fn format_fields(fields: &[Argument]) -> String {
    fields.iter().map(Argument::signature).join(", ")
}
