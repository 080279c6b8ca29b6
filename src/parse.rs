//! Análisis sintáctico.
//!
//! Descenso recursivo sobre el flujo de tokens con un token de lookahead
//! y acceso explícito a tokens posteriores mediante `peek(n)`. Un programa
//! es una lista de sentencias. Las sentencias compuestas (`if`, `while`,
//! `for`, `def`, `SEQ`, `PAR`) introducen un bloque indentado de la forma
//! `:` NEWLINE INDENT sentencias DEDENT.
//!
//! Las expresiones se analizan por niveles de precedencia estrictamente
//! crecientes: `or`, `and`, relacionales, aditivos, multiplicativos,
//! unarios y átomos. Todos los niveles binarios asocian a la izquierda.

use std::fmt::{self, Display};
use thiserror::Error;
use tracing::debug;

use crate::{
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

/// Raíz del árbol sintáctico.
#[derive(Debug, PartialEq)]
pub struct Ast {
    pub program: Block,
}

/// Lista de sentencias, ya sea el programa completo o el cuerpo de un bloque.
#[derive(Debug, Default, PartialEq)]
pub struct Block(pub Vec<Located<Statement>>);

impl Block {
    pub fn iter(&self) -> std::slice::Iter<'_, Located<Statement>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    Assignment(Assignment),

    If {
        condition: Located<Expr>,
        body: Block,
    },

    IfElse {
        condition: Located<Expr>,
        body: Block,
        otherwise: Block,
    },

    While {
        condition: Located<Expr>,
        body: Block,
    },

    For {
        init: Option<Located<Clause>>,
        condition: Option<Located<Expr>>,
        update: Option<Located<Clause>>,
        body: Block,
    },

    Function {
        name: Located<Identifier>,
        parameters: Vec<Located<Identifier>>,
        body: Block,
    },

    Call(Call),

    Builtin(BuiltinCall),

    Channel {
        name: Located<Identifier>,
        endpoints: [Located<Identifier>; 2],
    },

    Seq(Block),

    Par(Block),

    Return(Option<Located<Expr>>),
}

/// `nombre = expresión`
#[derive(Debug, PartialEq)]
pub struct Assignment {
    pub target: Located<Identifier>,
    pub value: Located<Expr>,
}

/// Inicialización o actualización de un `for`.
#[derive(Debug, PartialEq)]
pub enum Clause {
    Assignment(Assignment),
    Expr(Located<Expr>),
}

/// Llamada a una función definida por el usuario.
#[derive(Debug, PartialEq)]
pub struct Call {
    pub function: Located<Identifier>,
    pub args: Vec<Located<Expr>>,
}

/// Llamada a una función integrada.
#[derive(Debug, PartialEq)]
pub struct BuiltinCall {
    pub builtin: Builtin,
    pub args: Vec<Located<Expr>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Input,
}

impl Display for Builtin {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Builtin::Print => fmt.write_str("print"),
            Builtin::Input => fmt.write_str("input"),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Expr {
    Id(Identifier),
    Number(std::rc::Rc<str>),
    Boolean(bool),
    Str(std::rc::Rc<str>),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Unary(UnOp, Box<Located<Expr>>),
    Call(Call),
    Builtin(BuiltinCall),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Sub,
    Mul,
    Div,
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;
        let string = match self {
            Or             => "or",
            And            => "and",
            Equal          => "==",
            NotEqual       => "!=",
            Less           => "<",
            LessOrEqual    => "<=",
            Greater        => ">",
            GreaterOrEqual => ">=",
            Add            => "+",
            Sub            => "-",
            Mul            => "*",
            Div            => "/",
        };

        fmt.write_str(string)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

impl Display for UnOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Not => fmt.write_str("not"),
            UnOp::Neg => fmt.write_str("-"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected identifier, found {0} instead")]
    ExpectedId(Token),

    #[error("Expected any of `if`, `while`, `for`, `def`, `return`, `c_channel`, `SEQ`, `PAR`, assignment or call, found {0} instead")]
    ExpectedStatement(Token),

    #[error("Expected an expression, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Expected `=` or `(` after identifier `{0}`, found {1} instead")]
    ExpectedAssignOrCall(Identifier, Token),

    #[error("Leftover {0} after end of program")]
    TrailingInput(Token),
}

pub type Parse<T> = Result<T, Located<ParserError>>;

/// Analiza un flujo completo de tokens, el cual debe terminar en [`Token::Eof`].
pub fn parse(tokens: &[Located<Token>]) -> Parse<Ast> {
    if tokens.is_empty() {
        return Ok(Ast {
            program: Block::default(),
        });
    }

    let mut parser = Parser {
        tokens,
        position: 0,
        last_known: None,
    };

    let ast = parser.program()?;
    debug!(statements = ast.program.len(), "syntax analysis finished");

    Ok(ast)
}

const EOF: &Token = &Token::Eof;

struct Parser<'a> {
    tokens: &'a [Located<Token>],
    position: usize,
    last_known: Option<Location>,
}

impl<'a> Parser<'a> {
    fn program(&mut self) -> Parse<Ast> {
        let program = self.statements()?;

        match self.peek(0) {
            Token::Eof => Ok(Ast { program }),
            token => {
                let token = token.clone();
                self.fail_here(ParserError::TrailingInput(token))
            }
        }
    }

    /// Consume sentencias hasta encontrar el final de un bloque o del flujo.
    fn statements(&mut self) -> Parse<Block> {
        let mut statements = Vec::new();

        loop {
            self.skip_newlines();
            match self.peek(0) {
                Token::Eof | Token::Dedent => break Ok(Block(statements)),
                _ => statements.push(self.statement()?),
            }
        }
    }

    fn statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.here();

        let statement = match self.peek(0) {
            Token::Keyword(Keyword::If) => return self.if_statement(),
            Token::Keyword(Keyword::While) => return self.while_statement(),
            Token::Keyword(Keyword::For) => return self.for_statement(),
            Token::Keyword(Keyword::Def) => return self.function(),
            Token::Keyword(Keyword::Seq) => return self.compound(Keyword::Seq, Statement::Seq),
            Token::Keyword(Keyword::Par) => return self.compound(Keyword::Par, Statement::Par),

            Token::Keyword(Keyword::Channel) => self.channel()?,
            Token::Keyword(Keyword::Return) => self.return_statement()?,
            Token::Keyword(Keyword::Print | Keyword::Input) => {
                Statement::Builtin(self.builtin_call()?)
            }

            Token::Id(id) => match self.peek(1) {
                Token::Assign => Statement::Assignment(self.assignment()?),
                Token::OpenParen => Statement::Call(self.call()?),
                found => {
                    let error = ParserError::ExpectedAssignOrCall(id.clone(), found.clone());
                    self.next();
                    return self.fail_here(error);
                }
            },

            token => {
                let token = token.clone();
                return self.fail_here(ParserError::ExpectedStatement(token));
            }
        };

        // Las sentencias simples terminan al final de la línea
        let statement = self.located(statement, start);
        self.expect(Token::Newline)?;

        Ok(statement)
    }

    fn compound<F>(&mut self, keyword: Keyword, wrap: F) -> Parse<Located<Statement>>
    where
        F: FnOnce(Block) -> Statement,
    {
        let start = self.here();
        self.keyword(keyword)?;
        let body = self.block()?;

        Ok(self.located(wrap(body), start))
    }

    fn if_statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.here();

        self.keyword(Keyword::If)?;
        let condition = self.parenthesized()?;
        let body = self.block()?;

        let statement = if let Token::Keyword(Keyword::Else) = self.peek(0) {
            self.keyword(Keyword::Else)?;
            let otherwise = self.block()?;

            Statement::IfElse {
                condition,
                body,
                otherwise,
            }
        } else {
            Statement::If { condition, body }
        };

        Ok(self.located(statement, start))
    }

    fn while_statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.here();

        self.keyword(Keyword::While)?;
        let condition = self.parenthesized()?;
        let body = self.block()?;

        Ok(self.located(Statement::While { condition, body }, start))
    }

    fn for_statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.here();

        self.keyword(Keyword::For)?;
        self.expect(Token::OpenParen)?;

        let init = match self.peek(0) {
            Token::Semicolon => None,
            _ => Some(self.clause()?),
        };
        self.expect(Token::Semicolon)?;

        let condition = match self.peek(0) {
            Token::Semicolon => None,
            _ => Some(self.expr()?),
        };
        self.expect(Token::Semicolon)?;

        let update = match self.peek(0) {
            Token::CloseParen => None,
            _ => Some(self.clause()?),
        };
        self.expect(Token::CloseParen)?;

        let body = self.block()?;
        let statement = Statement::For {
            init,
            condition,
            update,
            body,
        };

        Ok(self.located(statement, start))
    }

    fn clause(&mut self) -> Parse<Located<Clause>> {
        match (self.peek(0), self.peek(1)) {
            (Token::Id(_), Token::Assign) => {
                let start = self.here();
                let assignment = self.assignment()?;
                Ok(self.located(Clause::Assignment(assignment), start))
            }

            _ => {
                let expr = self.expr()?;
                let location = expr.location().clone();
                Ok(Located::at(expr, location).map(Clause::Expr))
            }
        }
    }

    fn function(&mut self) -> Parse<Located<Statement>> {
        let start = self.here();

        self.keyword(Keyword::Def)?;
        let name = self.id()?;

        self.expect(Token::OpenParen)?;
        let parameters = self.comma_separated(Parser::id, Token::CloseParen)?;
        self.expect(Token::CloseParen)?;

        let body = self.block()?;
        let statement = Statement::Function {
            name,
            parameters,
            body,
        };

        Ok(self.located(statement, start))
    }

    fn channel(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Channel)?;

        let name = self.id()?;
        let endpoints = [self.id()?, self.id()?];

        Ok(Statement::Channel { name, endpoints })
    }

    fn return_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Return)?;

        let value = match self.peek(0) {
            Token::Newline => None,
            _ => Some(self.expr()?),
        };

        Ok(Statement::Return(value))
    }

    fn assignment(&mut self) -> Parse<Assignment> {
        let target = self.id()?;
        self.expect(Token::Assign)?;
        let value = self.expr()?;

        Ok(Assignment { target, value })
    }

    fn call(&mut self) -> Parse<Call> {
        let function = self.id()?;
        let args = self.arguments()?;

        Ok(Call { function, args })
    }

    fn builtin_call(&mut self) -> Parse<BuiltinCall> {
        let builtin = match self.next().into_inner() {
            Token::Keyword(Keyword::Print) => Builtin::Print,
            Token::Keyword(Keyword::Input) => Builtin::Input,
            found => return self.fail(ParserError::ExpectedExpr(found)),
        };

        let args = self.arguments()?;
        Ok(BuiltinCall { builtin, args })
    }

    fn arguments(&mut self) -> Parse<Vec<Located<Expr>>> {
        self.expect(Token::OpenParen)?;
        let args = self.comma_separated(Parser::expr, Token::CloseParen)?;
        self.expect(Token::CloseParen)?;

        Ok(args)
    }

    /// `(` expresión `)`
    fn parenthesized(&mut self) -> Parse<Located<Expr>> {
        self.expect(Token::OpenParen)?;
        let expr = self.expr()?;
        self.expect(Token::CloseParen)?;

        Ok(expr)
    }

    /// `:` NEWLINE INDENT sentencias DEDENT
    fn block(&mut self) -> Parse<Block> {
        self.expect(Token::Colon)?;
        self.expect(Token::Newline)?;
        self.skip_newlines();
        self.expect(Token::Indent)?;

        let body = self.statements()?;
        self.expect(Token::Dedent)?;

        Ok(body)
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.logic_or()
    }

    fn logic_or(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::logic_and, |token| match token {
            Token::Keyword(Keyword::Or) => Some(BinOp::Or),
            _ => None,
        })
    }

    fn logic_and(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::comparison, |token| match token {
            Token::Keyword(Keyword::And) => Some(BinOp::And),
            _ => None,
        })
    }

    fn comparison(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::sum, |token| match token {
            Token::Equal => Some(BinOp::Equal),
            Token::NotEqual => Some(BinOp::NotEqual),
            Token::Less => Some(BinOp::Less),
            Token::LessOrEqual => Some(BinOp::LessOrEqual),
            Token::Greater => Some(BinOp::Greater),
            Token::GreaterOrEqual => Some(BinOp::GreaterOrEqual),
            _ => None,
        })
    }

    fn sum(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::term, |token| match token {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn term(&mut self) -> Parse<Located<Expr>> {
        self.binary(Parser::unary, |token| match token {
            Token::Times => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            _ => None,
        })
    }

    /// Un nivel de precedencia binario, asociativo a la izquierda.
    fn binary<R, O>(&mut self, mut operand: R, operator: O) -> Parse<Located<Expr>>
    where
        R: FnMut(&mut Self) -> Parse<Located<Expr>>,
        O: Fn(&Token) -> Option<BinOp>,
    {
        let mut lhs = operand(self)?;

        while let Some(op) = operator(self.peek(0)) {
            self.next();
            let rhs = operand(self)?;

            let location = Location::span(lhs.location().clone(), rhs.location());
            lhs = Located::at(Expr::Binary(Box::new(lhs), op, Box::new(rhs)), location);
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Parse<Located<Expr>> {
        let op = match self.peek(0) {
            Token::Keyword(Keyword::Not) => UnOp::Not,
            Token::Minus => UnOp::Neg,
            _ => return self.atom(),
        };

        let start = self.here();
        self.next();

        let operand = self.unary()?;
        let location = Location::span(start, operand.location());

        Ok(Located::at(Expr::Unary(op, Box::new(operand)), location))
    }

    fn atom(&mut self) -> Parse<Located<Expr>> {
        let start = self.here();

        let expr = match self.peek(0) {
            Token::OpenParen => return self.parenthesized(),

            Token::Id(_) if *self.peek(1) == Token::OpenParen => Expr::Call(self.call()?),
            Token::Keyword(Keyword::Print | Keyword::Input) => Expr::Builtin(self.builtin_call()?),

            _ => match self.next().into_inner() {
                Token::Id(id) => Expr::Id(id),
                Token::Number(number) => Expr::Number(number),
                Token::Boolean(boolean) => Expr::Boolean(boolean),
                Token::Str(string) => Expr::Str(string),
                found => return self.fail(ParserError::ExpectedExpr(found)),
            },
        };

        Ok(self.located(expr, start))
    }

    /// Elementos separados por comas, posiblemente ninguno si el
    /// siguiente token es `close`.
    fn comma_separated<T, F>(&mut self, mut rule: F, close: Token) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = Vec::new();
        if *self.peek(0) == close {
            return Ok(items);
        }

        loop {
            items.push(rule(self)?);
            match self.peek(0) {
                Token::Comma => {
                    self.next();
                }

                _ => break Ok(items),
            }
        }
    }

    fn skip_newlines(&mut self) {
        while let Token::Newline = self.peek(0) {
            self.next();
        }
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next().split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            found => self.fail(ParserError::ExpectedId(found)),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().into_inner() {
            found if found == token => Ok(()),
            found => self.fail(ParserError::UnexpectedToken(token, found)),
        }
    }

    /// Observa el token `n` posiciones adelante sin consumirlo. Más allá
    /// del final siempre se observa [`Token::Eof`].
    fn peek(&self, n: usize) -> &'a Token {
        self.tokens
            .get(self.position + n)
            .or_else(|| self.tokens.last())
            .map(Located::val)
            .unwrap_or(EOF)
    }

    /// Consume el siguiente token. El último token (`Eof`) nunca se consume.
    fn next(&mut self) -> Located<Token> {
        let token = match self.tokens.get(self.position) {
            Some(token) => token.clone(),
            None => self.eof(),
        };

        if self.position < self.tokens.len().saturating_sub(1) {
            self.position += 1;
        }

        self.last_known = Some(token.location().clone());
        token
    }

    fn eof(&self) -> Located<Token> {
        match self.tokens.last() {
            Some(token) => token.clone(),
            None => unreachable!("token stream without EOF"),
        }
    }

    /// Ubicación del siguiente token.
    fn here(&self) -> Location {
        match self.tokens.get(self.position) {
            Some(token) => token.location().clone(),
            None => self.eof().location().clone(),
        }
    }

    fn located<T>(&self, value: T, start: Location) -> Located<T> {
        let end = self.last_known.as_ref().unwrap_or(&start).clone();
        Located::at(value, Location::span(start, &end))
    }

    /// Falla en la ubicación del último token consumido.
    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        let location = self.last_known.clone().unwrap_or_else(|| self.here());
        Err(Located::at(error, location))
    }

    /// Falla en la ubicación del siguiente token.
    fn fail_here<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.here()))
    }
}
