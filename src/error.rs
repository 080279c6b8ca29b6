//! Errores de compilación y su presentación.

use crate::{
    lex::LexerError,
    parse::ParserError,
    semantic::SemanticError,
    source::{Located, Location},
};

use std::{
    error::Error as StdError,
    fmt::{self, Display},
};

use thiserror::Error;

/// Primer error encontrado por alguna de las fases.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] Located<LexerError>),

    #[error(transparent)]
    Parse(#[from] Located<ParserError>),

    #[error(transparent)]
    Semantic(#[from] Located<SemanticError>),
}

impl Error {
    pub fn location(&self) -> &Location {
        match self {
            Error::Lex(error) => error.location(),
            Error::Parse(error) => error.location(),
            Error::Semantic(error) => error.location(),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn StdError;
    fn location(&self) -> &Location;
}

/// Reporte legible de errores, al estilo de rustc.
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl From<Error> for Diagnostics {
    fn from(error: Error) -> Self {
        match error {
            Error::Lex(error) => Diagnostics::from(error).kind("Lexical error"),
            Error::Parse(error) => Diagnostics::from(error).kind("Syntax error"),
            Error::Semantic(error) => Diagnostics::from(error).kind("Semantic error"),
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in location.start().line()..=location.end().line() {
                location.source().with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                })?
            }

            // El fin del rango es exclusivo y puede estar en otra línea
            let (from, to) = (location.start().column(), location.end().column().max(2) - 1);
            let min = from.min(to);
            let max = from.max(to);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: StdError> sealed::Sealed for Located<E> {}

impl<E: StdError> LocatedError for Located<E> {
    fn source(&self) -> &dyn StdError {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}
