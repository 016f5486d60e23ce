use super::ast::FunctionDef;
use indexmap::IndexMap;

/// Index of a function in its symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub usize);

/// Declared functions in declaration order. Immutable once parsing finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    functions: IndexMap<String, FunctionDef>,
}

impl SymbolTable {
    pub(crate) fn insert(&mut self, def: FunctionDef) -> Option<FunctionDef> {
        self.functions.insert(def.name.clone(), def)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn id(&self, name: &str) -> Option<FunctionId> {
        self.functions.get_index_of(name).map(FunctionId)
    }

    pub fn def(&self, id: FunctionId) -> &FunctionDef {
        &self.functions[id.0]
    }

    pub fn is_pure(&self, name: &str) -> bool {
        self.get(name).map_or(false, |f| f.pure)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionId, &FunctionDef)> {
        self.functions
            .values()
            .enumerate()
            .map(|(i, f)| (FunctionId(i), f))
    }
}
