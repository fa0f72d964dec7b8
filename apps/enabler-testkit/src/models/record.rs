//! Struct records discovered while scanning an IDL tree.

use serde::Serialize;
use std::path::PathBuf;

/// A struct declaration together with where it was found.
///
/// Field order drives the derived ordering: records sort by IDL file, then
/// struct name, which is the order fixtures are emitted in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StructRecord {
    /// IDL path relative to the scan root, without extension, `/`-separated.
    pub idl_file: String,
    pub name: String,
    /// Scoped module path joined with `::`; empty at file scope.
    pub module: String,
    pub root: PathBuf,
}

impl StructRecord {
    pub fn new(
        name: impl Into<String>,
        idl_file: impl Into<String>,
        module: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            idl_file: idl_file.into(),
            name: name.into(),
            module: module.into(),
            root: root.into(),
        }
    }

    /// Fully qualified C++ name of the generated pub/sub type.
    pub fn pubsub_type(&self) -> String {
        if self.module.is_empty() {
            format!("{}PubSubType", self.name)
        } else {
            format!("{}::{}PubSubType", self.module, self.name)
        }
    }
}
