//! Declaration records stored in the [`crate::CodeBase`].
//!
//! Records are plain values keyed by their [`Qsn`]. They hold names of
//! related declarations (parent class, interfaces, owner) rather than
//! references, so a record never keeps another one alive.

use bitflags::bitflags;
use phz_solver::{Ancestors, Qsn, SymbolKind, UnionType};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

bitflags! {
    /// Modifiers and provenance of a declaration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DeclFlags: u16 {
        const ABSTRACT = 1 << 0;
        const FINAL = 1 << 1;
        const STATIC = 1 << 2;
        const DEPRECATED = 1 << 3;
        const INTERFACE = 1 << 4;
        const TRAIT = 1 << 5;
        /// Declared inside an `if`/`else`, a loop or a function body, so it
        /// only exists once that code has run.
        const CONDITIONAL = 1 << 6;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Where and how something was declared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclInfo {
    pub file: Arc<str>,
    pub line: u32,
    pub flags: DeclFlags,
    pub visibility: Visibility,
}

impl DeclInfo {
    pub fn new(file: impl Into<Arc<str>>, line: u32) -> Self {
        DeclInfo {
            file: file.into(),
            line,
            flags: DeclFlags::empty(),
            visibility: Visibility::Public,
        }
    }

    pub fn with_flags(mut self, flags: DeclFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[inline]
    pub fn has(&self, flag: DeclFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// A class, interface or trait.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub qsn: Qsn,
    pub info: DeclInfo,
    pub parent: Option<Qsn>,
    pub interfaces: SmallVec<[Qsn; 2]>,
    pub traits: SmallVec<[Qsn; 2]>,
}

impl ClassDecl {
    pub fn new(qsn: Qsn, info: DeclInfo) -> Self {
        debug_assert_eq!(qsn.kind(), SymbolKind::Class);
        ClassDecl {
            qsn,
            info,
            parent: None,
            interfaces: SmallVec::new(),
            traits: SmallVec::new(),
        }
    }

    pub fn with_parent(mut self, parent: Qsn) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_interfaces(mut self, interfaces: impl IntoIterator<Item = Qsn>) -> Self {
        self.interfaces.extend(interfaces);
        self
    }

    pub fn with_traits(mut self, traits: impl IntoIterator<Item = Qsn>) -> Self {
        self.traits.extend(traits);
        self
    }

    pub fn is_interface(&self) -> bool {
        self.info.has(DeclFlags::INTERFACE)
    }

    pub fn is_trait(&self) -> bool {
        self.info.has(DeclFlags::TRAIT)
    }

    pub fn is_abstract(&self) -> bool {
        self.info.has(DeclFlags::ABSTRACT)
    }

    /// Parent plus interfaces, the edges followed by type expansion.
    /// Traits are not types and are left out.
    pub fn direct_ancestors(&self) -> Ancestors {
        let mut ancestors = Ancestors::new();
        ancestors.extend(self.parent.iter().cloned());
        ancestors.extend(self.interfaces.iter().cloned());
        ancestors
    }
}

/// One parameter of a function or method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: Arc<str>,
    pub union_type: UnionType,
    pub is_optional: bool,
}

impl ParamDecl {
    pub fn new(name: &str, union_type: UnionType) -> Self {
        ParamDecl {
            name: Arc::from(name),
            union_type,
            is_optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub qsn: Qsn,
    pub info: DeclInfo,
    pub params: Vec<ParamDecl>,
    /// Declared return type; empty when undeclared.
    pub return_type: UnionType,
}

impl FunctionDecl {
    pub fn new(qsn: Qsn, info: DeclInfo) -> Self {
        debug_assert_eq!(qsn.kind(), SymbolKind::Function);
        FunctionDecl {
            qsn,
            info,
            params: Vec::new(),
            return_type: UnionType::empty(),
        }
    }

    pub fn with_params(mut self, params: Vec<ParamDecl>) -> Self {
        self.params = params;
        self
    }

    pub fn with_return_type(mut self, return_type: UnionType) -> Self {
        self.return_type = return_type;
        self
    }

    /// Number of arguments a call must pass.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| !p.is_optional).count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub qsn: Qsn,
    pub info: DeclInfo,
    pub params: Vec<ParamDecl>,
    pub return_type: UnionType,
}

impl MethodDecl {
    pub fn new(qsn: Qsn, info: DeclInfo) -> Self {
        debug_assert_eq!(qsn.kind(), SymbolKind::Method);
        MethodDecl {
            qsn,
            info,
            params: Vec::new(),
            return_type: UnionType::empty(),
        }
    }

    pub fn with_params(mut self, params: Vec<ParamDecl>) -> Self {
        self.params = params;
        self
    }

    pub fn with_return_type(mut self, return_type: UnionType) -> Self {
        self.return_type = return_type;
        self
    }

    /// The class-like declaring this method.
    pub fn owner(&self) -> Option<&Qsn> {
        self.qsn.owner()
    }

    pub fn is_static(&self) -> bool {
        self.info.has(DeclFlags::STATIC)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub qsn: Qsn,
    pub info: DeclInfo,
    pub union_type: UnionType,
}

impl PropertyDecl {
    pub fn new(qsn: Qsn, info: DeclInfo, union_type: UnionType) -> Self {
        debug_assert_eq!(qsn.kind(), SymbolKind::Property);
        PropertyDecl {
            qsn,
            info,
            union_type,
        }
    }
}

/// A global constant or a class constant, told apart by the QSN kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDecl {
    pub qsn: Qsn,
    pub info: DeclInfo,
    pub union_type: UnionType,
}

impl ConstantDecl {
    pub fn new(qsn: Qsn, info: DeclInfo, union_type: UnionType) -> Self {
        debug_assert!(matches!(
            qsn.kind(),
            SymbolKind::GlobalConstant | SymbolKind::ClassConstant
        ));
        ConstantDecl {
            qsn,
            info,
            union_type,
        }
    }

    pub fn is_class_constant(&self) -> bool {
        self.qsn.kind() == SymbolKind::ClassConstant
    }
}
