//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`Source`]
//! en unidades léxicas denominadas tokens. Los espacios en blanco y
//! los comentarios se descartan durante esta operación. Cada token
//! emitido está asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores en tanto los mismos como constructos
//! más elevados de fases posteriores.
//!
//! # Indentación
//! El lenguaje delimita bloques por indentación. El lexer procesa el
//! código línea por línea y mantiene una pila de anchos de indentación,
//! inicialmente `[0]`. Cuando una línea comienza más a la derecha que
//! el tope de la pila se emite [`Token::Indent`]; cuando comienza más a
//! la izquierda se emite un [`Token::Dedent`] por cada nivel descartado.
//! El ancho final debe coincidir exactamente con algún nivel anterior.
//! Las líneas en blanco y las que solo contienen comentarios no afectan
//! la indentación. Cada línea significativa termina en [`Token::Newline`]
//! y el flujo siempre termina en [`Token::Eof`].
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho
//! de lo que son y no incluyen lexemas. Los identificadores y las cadenas
//! sí incluyen su lexema original, al igual que las constantes numéricas,
//! cuyo texto se preserva sin normalizar. Las constantes booleanas se
//! resuelven a sus valores.
//!
//! # Errores
//! El primer error léxico detiene el análisis.

use crate::source::{Located, Location, Position, Source};
use std::{
    borrow::Borrow,
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;
use tracing::{debug, trace};

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante numérica va seguida inmediatamente de una letra.
    #[error("Malformed number literal `{0}`")]
    MalformedNumber(String),

    /// Una cadena llegó al final de la línea sin cerrarse.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// La indentación retrocede a un ancho que nunca se abrió.
    #[error("Dedent to width {found} does not match any outer indentation level (nearest is {expected})")]
    BadDedent { found: u32, expected: u32 },
}

pub type Lex<T> = Result<T, Located<LexerError>>;

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl Identifier {
    /// Construye un identificador sin validar su contenido.
    pub fn new(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::new(name)
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal numérico, entero o con fracción, tal como se escribió.
    Number(Rc<str>),

    /// `True` o `False`.
    Boolean(bool),

    /// Literal de cadena, sin comillas y con escapes intactos.
    Str(Rc<str>),

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `;`
    Semicolon,

    /// `:`
    Colon,

    /// `,`
    Comma,

    /// Aumento de indentación.
    Indent,

    /// Reducción de indentación.
    Dedent,

    /// Fin de una línea significativa.
    Newline,

    /// Fin del flujo.
    Eof,
}

/// Categoría léxica de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    Number,
    Boolean,
    String,
    Id,
    Keyword,
    Op,
    Sym,
    Indent,
    Dedent,
    Newline,
    Eof,
}

impl Display for Tag {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Tag::*;
        let string = match self {
            Number  => "NUMBER",
            Boolean => "BOOLEAN",
            String  => "STRING",
            Id      => "ID",
            Keyword => "KEYWORD",
            Op      => "OP",
            Sym     => "SYM",
            Indent  => "INDENT",
            Dedent  => "DEDENT",
            Newline => "NEWLINE",
            Eof     => "EOF",
        };

        fmt.write_str(string)
    }
}

impl Token {
    /// Obtiene la categoría léxica.
    pub fn tag(&self) -> Tag {
        use Token::*;

        match self {
            Id(_) => Tag::Id,
            Keyword(_) => Tag::Keyword,
            Number(_) => Tag::Number,
            Boolean(_) => Tag::Boolean,
            Str(_) => Tag::String,

            Assign | Equal | NotEqual | Less | LessOrEqual | Greater | GreaterOrEqual | Plus
            | Minus | Times | Slash => Tag::Op,

            OpenParen | CloseParen | OpenCurly | CloseCurly | Semicolon | Colon | Comma => {
                Tag::Sym
            }

            Indent => Tag::Indent,
            Dedent => Tag::Dedent,
            Newline => Tag::Newline,
            Eof => Tag::Eof,
        }
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Number(number) => write!(fmt, "literal `{}`", number),
            Boolean(true) => fmt.write_str("literal `True`"),
            Boolean(false) => fmt.write_str("literal `False`"),
            Str(string) => write!(fmt, "literal `\"{}\"`", string),
            Assign => fmt.write_str("`=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessOrEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterOrEqual => fmt.write_str("`>=`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseCurly => fmt.write_str("`}`"),
            Semicolon => fmt.write_str("`;`"),
            Colon => fmt.write_str("`:`"),
            Comma => fmt.write_str("`,`"),
            Indent => fmt.write_str("indentation"),
            Dedent => fmt.write_str("end of block"),
            Newline => fmt.write_str("end of line"),
            Eof => fmt.write_str("end of input"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    While,
    For,
    Def,
    Return,
    Channel,
    Seq,
    Par,
    And,
    Or,
    Not,
    Print,
    Input,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("if",        Keyword::If),
    ("else",      Keyword::Else),
    ("while",     Keyword::While),
    ("for",       Keyword::For),
    ("def",       Keyword::Def),
    ("return",    Keyword::Return),
    ("c_channel", Keyword::Channel),
    ("SEQ",       Keyword::Seq),
    ("PAR",       Keyword::Par),
    ("and",       Keyword::And),
    ("or",        Keyword::Or),
    ("not",       Keyword::Not),
    ("print",     Keyword::Print),
    ("input",     Keyword::Input),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map(|&(name, _)| name)
            .unwrap_or("?");

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en la línea actual.
pub struct Lexer {
    source: Rc<Source>,
    indents: Vec<u32>,
    tokens: Vec<Located<Token>>,
}

/// Posibles estados del lexer dentro de una línea.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido
    /// y pasa a [`State::Start`] sin consumir entrada.
    Complete(Token),

    /// Término que puede ser un identificador, una palabra clave o un booleano.
    Word(String),

    /// Parte entera de una constante numérica.
    Integer(String),

    /// Parte fraccionaria de una constante numérica, ya con su `'.'`.
    Fraction(String),

    /// Interior de una cadena.
    Quoted { content: String, escaped: bool },

    /// Se encontró uno de `=`, `!`, `<`, `>`; puede seguir un `=`.
    Operator(char),
}

impl Lexer {
    /// Crea un lexer en estado inicial a partir de un origen.
    pub fn new(source: Rc<Source>) -> Self {
        Lexer {
            source,
            indents: vec![0],
            tokens: Vec::new(),
        }
    }

    /// Reduce la entrada completa a una secuencia de tokens terminada
    /// en [`Token::Eof`], o bien al primer error encontrado.
    pub fn tokenize(mut self) -> Lex<Vec<Located<Token>>> {
        let source = Rc::clone(&self.source);

        let mut last_line = 0;
        for (number, line) in source.lines() {
            self.line(number, line)?;
            last_line = number;
        }

        // Los niveles de indentación pendientes se cierran al final
        let end = Position::new(last_line + 1, 1);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.emit(Token::Dedent, end, end.advance());
        }

        self.emit(Token::Eof, end, end.advance());

        debug!(
            source = source.name(),
            lines = last_line,
            tokens = self.tokens.len(),
            "lexical analysis finished"
        );

        Ok(self.tokens)
    }

    /// Procesa una línea física.
    fn line(&mut self, number: u32, text: &str) -> Lex<()> {
        let chars: Vec<char> = text.chars().collect();

        let mut position = Position::new(number, 1);
        let mut skip = 0;
        while let Some(&c) = chars.get(skip) {
            match c {
                ' ' | '\t' => position = position.step(c),
                _ => break,
            }

            skip += 1;
        }

        // Líneas en blanco o de solo comentario
        match chars.get(skip) {
            None | Some('#') => return Ok(()),
            Some(_) => (),
        }

        self.indentation(position)?;
        let end = self.scan(&chars[skip..], position)?;
        self.emit(Token::Newline, end, end.advance());

        Ok(())
    }

    /// Compara el ancho de indentación de la línea con la pila de niveles.
    fn indentation(&mut self, position: Position) -> Lex<()> {
        let width = position.column() - 1;
        let top = self.top();

        if width > top {
            trace!(line = position.line(), width, "indent");
            self.indents.push(width);
            self.emit(Token::Indent, position, position.advance());
        } else if width < top {
            while width < self.top() {
                trace!(line = position.line(), width, "dedent");
                self.indents.pop();
                self.emit(Token::Dedent, position, position.advance());
            }

            if width != self.top() {
                let error = LexerError::BadDedent {
                    found: width,
                    expected: self.top(),
                };

                return Err(Located::at(error, self.locate(position)));
            }
        }

        Ok(())
    }

    /// Escanea los tokens de una línea a partir de su primer carácter
    /// significativo. Retorna la posición final de la línea.
    fn scan(&mut self, chars: &[char], mut next: Position) -> Lex<Position> {
        use {State::*, Token::*};

        let mut state = Start;
        let mut start = next;
        let mut index = 0;

        loop {
            let next_char = chars.get(index).copied();

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = state {
                start = next;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut state, next_char) {
                // Fin de línea o inicio de comentario
                (Start, None) | (Start, Some('#')) => return Ok(next),

                // Tokens triviales
                (Start, Some(' ')) | (Start, Some('\t')) => (),
                (Start, Some('+')) => state = Complete(Plus),
                (Start, Some('-')) => state = Complete(Minus),
                (Start, Some('*')) => state = Complete(Times),
                (Start, Some('/')) => state = Complete(Slash),
                (Start, Some('(')) => state = Complete(OpenParen),
                (Start, Some(')')) => state = Complete(CloseParen),
                (Start, Some('{')) => state = Complete(OpenCurly),
                (Start, Some('}')) => state = Complete(CloseCurly),
                (Start, Some(';')) => state = Complete(Semicolon),
                (Start, Some(':')) => state = Complete(Colon),
                (Start, Some(',')) => state = Complete(Comma),
                (Start, Some(c @ ('=' | '!' | '<' | '>'))) => state = Operator(c),
                (Start, Some('"')) => {
                    state = Quoted {
                        content: String::new(),
                        escaped: false,
                    }
                }

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume el
                // dígito, ya que esta lógica ya está implementada en el
                // caso para el estado de parte entera
                (Start, Some(c)) if c.is_ascii_digit() => {
                    state = Integer(String::new());
                    continue;
                }

                (Start, Some(c)) => {
                    let location = self.locate(next);
                    return Err(Located::at(LexerError::BadChar(c), location));
                }

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => {
                    let token = std::mem::replace(token, Eof);
                    self.emit(token, start, next);

                    state = Start;
                    continue;
                }

                // Operadores de uno o dos caracteres
                (Operator(first), Some('=')) => {
                    let token = match *first {
                        '=' => Equal,
                        '!' => NotEqual,
                        '<' => LessOrEqual,
                        _ => GreaterOrEqual,
                    };

                    state = Complete(token);
                }

                (Operator('!'), _) => {
                    let location = self.locate(next);
                    return Err(Located::at(LexerError::Expected('='), location));
                }

                (Operator(first), _) => {
                    let token = match *first {
                        '=' => Assign,
                        '<' => Less,
                        _ => Greater,
                    };

                    self.emit(token, start, next);
                    state = Start;
                    continue;
                }

                // Acumulación dígito por dígito de constantes
                (Integer(digits), Some(digit)) | (Fraction(digits), Some(digit))
                    if digit.is_ascii_digit() =>
                {
                    digits.push(digit)
                }

                // Un punto solo inicia una fracción si le sigue un dígito
                (Integer(digits), Some('.'))
                    if chars.get(index + 1).map_or(false, char::is_ascii_digit) =>
                {
                    let mut digits = std::mem::take(digits);
                    digits.push('.');
                    state = Fraction(digits);
                }

                (Integer(digits), Some(c)) | (Fraction(digits), Some(c)) if is_word_char(c) => {
                    let mut literal = std::mem::take(digits);
                    literal.push(c);

                    let location = Location::between(self.source.clone(), start, next.advance());
                    return Err(Located::at(LexerError::MalformedNumber(literal), location));
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(digits), _) | (Fraction(digits), _) => {
                    let literal = Rc::from(std::mem::take(digits));
                    self.emit(Number(literal), start, next);
                    state = Start;
                    continue;
                }

                // Cadenas; los escapes se preservan tal cual
                (Quoted { content, escaped }, Some(c)) => {
                    if *escaped {
                        content.push(c);
                        *escaped = false;
                    } else if c == '\\' {
                        content.push(c);
                        *escaped = true;
                    } else if c == '"' {
                        let content = std::mem::take(content);
                        state = Complete(Token::Str(Rc::from(content)));
                    } else {
                        content.push(c);
                    }
                }

                (Quoted { .. }, None) => {
                    let location = Location::between(self.source.clone(), start, next);
                    return Err(Located::at(LexerError::UnterminatedString, location));
                }

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let token = match word.as_str() {
                        "True" => Boolean(true),
                        "False" => Boolean(false),
                        word => match self::Keyword::from_str(word) {
                            Ok(keyword) => Keyword(keyword),
                            Err(()) => Id(Identifier::new(word)),
                        },
                    };

                    self.emit(token, start, next);
                    state = Start;
                    continue;
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(c) = next_char {
                index += 1;
                next = next.step(c);
            }
        }
    }

    fn top(&self) -> u32 {
        self.indents.last().copied().unwrap_or(0)
    }

    fn locate(&self, position: Position) -> Location {
        Location::at(Rc::clone(&self.source), position)
    }

    fn emit(&mut self, token: Token, start: Position, end: Position) {
        let location = Location::between(Rc::clone(&self.source), start, end);
        self.tokens.push(Located::at(token, location));
    }
}

/// Atajo para tokenizar un origen completo.
pub fn tokenize(source: &Rc<Source>) -> Lex<Vec<Located<Token>>> {
    Lexer::new(Rc::clone(source)).tokenize()
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
