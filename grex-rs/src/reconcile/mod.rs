//! Shared post-processing of parsed directories.
//!
//! Descriptors use [`rebase_offsets`] and [`NameTree`] while parsing; the
//! [`Reconciler`] runs ordered [`ReconcilePass`]es over a finished entry list.

mod name_dictionary;
mod name_tree;
mod passes;
mod rebase;

pub use name_dictionary::{NameDictionary, NameHash};
pub use name_tree::{NameNode, NameTree, ParentRef};
pub use passes::{placeholder_name, ExtensionSniffPass, HashRenamePass, ReconcilePass, Reconciler};
pub use rebase::{rebase_offsets, DeclaredSpan, PhysicalLocation};

/// The deepest parent chain a name walk follows before giving up.
pub const MAX_NAME_DEPTH: usize = 50;
