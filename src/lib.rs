//! Front end del compilador de minipar.
//!
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens con indentación explícita.
//! El flujo de tokens se dispone en un AST por medio de análisis
//! sintáctico en [`parse`]. El árbol sintáctico es validado por
//! análisis semántico en [`semantic`], donde además se infieren los
//! tipos de parámetros y retornos de funciones. Finalmente, el mismo
//! árbol se linealiza en la representación intermedia descrita en
//! [`ir`] por medio de [`lower`].
//!
//! El análisis semántico y la generación de IR son recorridos
//! independientes del mismo AST. Cualquier fase aborta con el primer
//! error que encuentra, ver [`error`].

#[macro_use]
mod macros;

pub mod error;
pub mod ir;
pub mod lex;
pub mod lower;
pub mod parse;
pub mod semantic;
pub mod source;

pub use error::{Diagnostics, Error};

use source::Source;
use std::rc::Rc;

/// Ejecuta todas las fases sobre un archivo fuente.
pub fn compile(source: &Rc<Source>) -> Result<ir::Program, Error> {
    let tokens = lex::tokenize(source)?;
    let ast = parse::parse(&tokens)?;
    ast.analyze()?;

    Ok(ast.lower())
}
