//! Tablas de símbolos y su encadenamiento léxico.
//!
//! Los ámbitos anidados solo existen mientras se analiza el bloque que
//! los introduce, por lo cual el árbol de ámbitos vivos siempre es una
//! cadena desde el ámbito global hasta el actual. Esta cadena se guarda
//! como una pila de tablas; un [`ScopeId`] es la profundidad de una tabla
//! en la pila y funciona como referencia no propietaria hacia un ámbito
//! que encierra al actual.

use std::collections::HashMap;

use super::Type;
use crate::{lex::Identifier, parse::Block};

/// Información asociada a un nombre.
#[derive(Debug)]
pub enum Symbol<'ast> {
    Variable { typ: Type, initialized: bool },
    Function(FunctionInfo<'ast>),
}

impl Symbol<'_> {
    /// Tipo con el que el símbolo aparece en una expresión.
    pub fn typ(&self) -> Type {
        match self {
            Symbol::Variable { typ, .. } => *typ,
            Symbol::Function(_) => Type::Function,
        }
    }
}

/// Metadatos de una función definida por el usuario.
#[derive(Debug)]
pub struct FunctionInfo<'ast> {
    pub(super) parameters: Vec<Identifier>,
    pub(super) parameter_types: HashMap<Identifier, Type>,
    pub(super) return_type: Type,
    pub(super) body: &'ast Block,
}

impl<'ast> FunctionInfo<'ast> {
    pub(super) fn new(parameters: Vec<Identifier>, body: &'ast Block) -> Self {
        let parameter_types = parameters
            .iter()
            .map(|parameter| (parameter.clone(), Type::Unknown))
            .collect();

        FunctionInfo {
            parameters,
            parameter_types,
            return_type: Type::Unknown,
            body,
        }
    }

    /// Nombres de los parámetros en orden de declaración.
    pub fn parameters(&self) -> &[Identifier] {
        &self.parameters
    }

    /// Tipo inferido de un parámetro a partir de su uso en el cuerpo.
    pub fn parameter_type(&self, name: &str) -> Option<Type> {
        self.parameter_types.get(name).copied()
    }

    /// Tipos de los parámetros en orden de declaración.
    pub fn signature(&self) -> Vec<Type> {
        self.parameters
            .iter()
            .map(|parameter| self.parameter_types.get(parameter).copied().unwrap_or_default())
            .collect()
    }

    pub fn return_type(&self) -> Type {
        self.return_type
    }

    pub fn body(&self) -> &'ast Block {
        self.body
    }
}

/// Un ámbito: correspondencia de nombres a símbolos.
#[derive(Debug, Default)]
pub struct SymbolTable<'ast> {
    symbols: HashMap<Identifier, Symbol<'ast>>,
}

impl<'ast> SymbolTable<'ast> {
    pub fn get(&self, name: &str) -> Option<&Symbol<'ast>> {
        self.symbols.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Symbol<'ast>)> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Referencia a un ámbito vivo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn depth(self) -> usize {
        self.0
    }
}

/// Cadena de ámbitos vivos, del global (fondo) al actual (tope).
pub(super) struct Scopes<'ast> {
    tables: Vec<SymbolTable<'ast>>,
}

impl<'ast> Scopes<'ast> {
    pub fn new() -> Self {
        Scopes {
            tables: vec![SymbolTable::default()],
        }
    }

    pub fn current(&self) -> ScopeId {
        ScopeId(self.tables.len() - 1)
    }

    /// Abre un ámbito hijo del actual.
    pub fn push(&mut self) -> ScopeId {
        self.tables.push(SymbolTable::default());
        self.current()
    }

    /// Descarta el ámbito actual. El ámbito global nunca se descarta.
    pub fn pop(&mut self) -> Option<SymbolTable<'ast>> {
        if self.tables.len() > 1 {
            self.tables.pop()
        } else {
            None
        }
    }

    /// Consume la cadena y conserva únicamente el ámbito global.
    pub fn into_global(mut self) -> SymbolTable<'ast> {
        self.tables.truncate(1);
        self.tables.pop().unwrap_or_default()
    }

    /// Define un nombre en el ámbito actual. Falla si el nombre ya
    /// existe en este mismo ámbito.
    pub fn define(&mut self, name: Identifier, symbol: Symbol<'ast>) -> Result<(), Identifier> {
        let table = self.top_mut();
        if table.symbols.contains_key(&name) {
            return Err(name);
        }

        table.symbols.insert(name, symbol);
        Ok(())
    }

    /// Busca el ámbito más interno que define un nombre.
    pub fn resolve(&self, name: &str) -> Option<ScopeId> {
        self.tables
            .iter()
            .rposition(|table| table.symbols.contains_key(name))
            .map(ScopeId)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol<'ast>> {
        let ScopeId(depth) = self.resolve(name)?;
        self.tables[depth].symbols.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol<'ast>> {
        let ScopeId(depth) = self.resolve(name)?;
        self.tables[depth].symbols.get_mut(name)
    }

    /// Acceso directo a un ámbito conocido, sin recorrer la cadena.
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Symbol<'ast>> {
        self.tables.get(scope.0)?.symbols.get(name)
    }

    pub fn get_mut(&mut self, scope: ScopeId, name: &str) -> Option<&mut Symbol<'ast>> {
        self.tables.get_mut(scope.0)?.symbols.get_mut(name)
    }

    fn top_mut(&mut self) -> &mut SymbolTable<'ast> {
        if self.tables.is_empty() {
            self.tables.push(SymbolTable::default());
        }

        let last = self.tables.len() - 1;
        &mut self.tables[last]
    }
}
