//! Análisis semántico.
//!
//! Un único visitante recursivo recorre el AST con la cadena de ámbitos
//! en la que cada nodo se evalúa léxicamente. Las expresiones retornan
//! su tipo inferido; las sentencias no retornan valor.
//!
//! # Inferencia
//! Los parámetros de una función comienzan con tipo `unknown`. Su tipo
//! se infiere a partir del uso dentro del cuerpo: cuando un operador
//! aritmético o lógico recibe un identificador de tipo desconocido, el
//! tipo almacenado del identificador se corrige al tipo que el operador
//! espera. Al terminar el cuerpo, los tipos de los parámetros se copian
//! a la firma de la función. Las llamadas no aportan información de tipos.
//!
//! Esta corrección depende del orden de visita: dos usos incompatibles
//! de un mismo identificador pueden reportar errores distintos según
//! cuál se visite primero.
//!
//! # Ámbitos
//! Cada bloque compuesto (ramas de `if`, cuerpos de ciclos, `SEQ`, `PAR`
//! y funciones) abre un ámbito hijo que se descarta al terminar. Los
//! canales son la excepción a la regla de redefinición: declarar un
//! nombre ya existente como canal no tiene efecto.

mod scope;

pub use scope::{FunctionInfo, ScopeId, Symbol, SymbolTable};

use scope::Scopes;
use thiserror::Error;
use tracing::{debug, trace};

use std::fmt::{self, Display};

use crate::{
    lex::Identifier,
    parse::{self, Assignment, BinOp, Block, BuiltinCall, Call, Clause, Expr, Statement, UnOp},
    source::{Located, Location},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Number,
    Boolean,
    String,
    Channel,
    Function,
    Void,
    Unknown,
}

impl Type {
    /// Determina si el tipo ya fue resuelto.
    pub fn is_known(self) -> bool {
        self != Type::Unknown
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::Unknown
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => fmt.write_str("number"),
            Type::Boolean => fmt.write_str("boolean"),
            Type::String => fmt.write_str("string"),
            Type::Channel => fmt.write_str("channel"),
            Type::Function => fmt.write_str("function"),
            Type::Void => fmt.write_str("void"),
            Type::Unknown => fmt.write_str("unknown"),
        }
    }
}

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum SemanticError {
    #[error("Symbol `{0}` is undefined")]
    Undefined(Identifier),

    #[error("Symbol `{0}` is already defined")]
    Redefinition(Identifier),

    #[error("Variable `{0}` is read before being initialized")]
    Uninitialized(Identifier),

    #[error("`{0}` is not a function")]
    NotAFunction(Identifier),

    #[error("Function `{function}` expects {expected} argument(s), received {received}")]
    Arity {
        function: Identifier,
        expected: usize,
        received: usize,
    },

    #[error("Type mismatch in assignment to `{target}`: expected `{expected}`, found `{found}`")]
    AssignmentMismatch {
        target: Identifier,
        expected: Type,
        found: Type,
    },

    #[error("Type mismatch in argument {position} of `{function}`: expected `{expected}`, found `{found}`")]
    ArgumentMismatch {
        function: Identifier,
        position: usize,
        expected: Type,
        found: Type,
    },

    #[error("Operator `{op}` applied to incompatible types `{left}` and `{right}`")]
    OperandMismatch { op: BinOp, left: Type, right: Type },

    #[error("Type mismatch: expected `{0}`, found `{1}`")]
    ExpectedType(Type, Type),

    #[error("Condition of `{construct}` must be `boolean`, found `{found}`")]
    NonBooleanCondition { construct: &'static str, found: Type },

    #[error("`return` outside of a function")]
    ReturnOutsideFunction,

    #[error("Function `{function}` returns inconsistent types `{previous}` and `{found}`")]
    ConflictingReturn {
        function: Identifier,
        previous: Type,
        found: Type,
    },
}

/// Resultado de un análisis exitoso: el ámbito global con sus tipos finales.
#[derive(Debug)]
pub struct Analysis<'ast> {
    globals: SymbolTable<'ast>,
}

impl<'ast> Analysis<'ast> {
    pub fn globals(&self) -> &SymbolTable<'ast> {
        &self.globals
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol<'ast>> {
        self.globals.get(name)
    }

    /// Tipo final de un nombre global.
    pub fn type_of(&self, name: &str) -> Option<Type> {
        self.symbol(name).map(Symbol::typ)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo<'ast>> {
        match self.symbol(name)? {
            Symbol::Function(info) => Some(info),
            Symbol::Variable { .. } => None,
        }
    }
}

impl parse::Ast {
    /// Valida el programa y deriva los tipos de sus símbolos globales.
    pub fn analyze(&self) -> Semantic<Analysis<'_>> {
        let mut context = Context::new();
        context.scan_block(&self.program)?;

        let globals = context.scopes.into_global();
        debug!(globals = globals.len(), "semantic analysis finished");

        Ok(Analysis { globals })
    }
}

/// Estado del visitante.
struct Context<'ast> {
    scopes: Scopes<'ast>,

    /// Función cuyo cuerpo se analiza actualmente y el ámbito que la define.
    function: Option<(ScopeId, Identifier)>,
}

impl<'ast> Context<'ast> {
    fn new() -> Self {
        Context {
            scopes: Scopes::new(),
            function: None,
        }
    }

    fn scan_block(&mut self, block: &'ast Block) -> Semantic<()> {
        block
            .iter()
            .try_for_each(|statement| self.scan_statement(statement))
    }

    fn scan_statement(&mut self, statement: &'ast Located<Statement>) -> Semantic<()> {
        match statement.as_ref() {
            Statement::Assignment(assignment) => self.assign(assignment),

            Statement::If { condition, body } => {
                self.condition(condition, "if")?;
                self.ephemeral(|this| this.scan_block(body))
            }

            Statement::IfElse {
                condition,
                body,
                otherwise,
            } => {
                self.condition(condition, "if")?;
                self.ephemeral(|this| this.scan_block(body))?;
                self.ephemeral(|this| this.scan_block(otherwise))
            }

            Statement::While { condition, body } => {
                self.condition(condition, "while")?;
                self.ephemeral(|this| this.scan_block(body))
            }

            Statement::For {
                init,
                condition,
                update,
                body,
            } => self.ephemeral(|this| {
                if let Some(init) = init {
                    this.clause(init)?;
                }

                if let Some(condition) = condition {
                    this.condition(condition, "for")?;
                }

                if let Some(update) = update {
                    this.clause(update)?;
                }

                this.ephemeral(|this| this.scan_block(body))
            }),

            Statement::Function {
                name,
                parameters,
                body,
            } => self.function(name, parameters, body),

            Statement::Call(call) => self.call(call).map(|_| ()),

            Statement::Builtin(call) => self.builtin(call).map(|_| ()),

            Statement::Channel { name, endpoints } => {
                for id in std::iter::once(name).chain(endpoints.iter()) {
                    if self.scopes.resolve(id.as_ref().as_ref()).is_none() {
                        let channel = Symbol::Variable {
                            typ: Type::Channel,
                            initialized: true,
                        };

                        // No puede fallar, el nombre no existe en ningún ámbito
                        let _ = self.scopes.define(id.val().clone(), channel);
                    }
                }

                Ok(())
            }

            Statement::Seq(body) | Statement::Par(body) => {
                self.ephemeral(|this| this.scan_block(body))
            }

            Statement::Return(value) => self.return_statement(value.as_ref(), statement.location()),
        }
    }

    fn assign(&mut self, assignment: &'ast Assignment) -> Semantic<()> {
        let Assignment { target, value } = assignment;
        let found = self.eval(value)?;

        match self.scopes.lookup_mut(target.as_ref().as_ref()) {
            None => {
                let variable = Symbol::Variable {
                    typ: found,
                    initialized: true,
                };

                let _ = self.scopes.define(target.val().clone(), variable);
            }

            Some(Symbol::Variable { typ, initialized }) => {
                if *typ != found && typ.is_known() {
                    let error = SemanticError::AssignmentMismatch {
                        target: target.val().clone(),
                        expected: *typ,
                        found,
                    };

                    fail!(target.location(), error);
                }

                *typ = found;
                *initialized = true;
            }

            Some(Symbol::Function(_)) => {
                let error = SemanticError::AssignmentMismatch {
                    target: target.val().clone(),
                    expected: Type::Function,
                    found,
                };

                fail!(target.location(), error);
            }
        }

        Ok(())
    }

    fn clause(&mut self, clause: &'ast Located<Clause>) -> Semantic<()> {
        match clause.as_ref() {
            Clause::Assignment(assignment) => self.assign(assignment),
            Clause::Expr(expr) => self.eval(expr).map(|_| ()),
        }
    }

    fn condition(&mut self, condition: &'ast Located<Expr>, construct: &'static str) -> Semantic<()> {
        let found = self.eval(condition)?;
        if found != Type::Boolean {
            let error = SemanticError::NonBooleanCondition { construct, found };
            fail!(condition.location(), error);
        }

        Ok(())
    }

    fn function(
        &mut self,
        name: &'ast Located<Identifier>,
        parameters: &'ast [Located<Identifier>],
        body: &'ast Block,
    ) -> Semantic<()> {
        if self.scopes.resolve(name.as_ref().as_ref()).is_some() {
            fail!(name.location(), SemanticError::Redefinition(name.val().clone()));
        }

        // La función existe antes de analizar su cuerpo, lo cual permite recursión
        let names = parameters.iter().map(|p| p.val().clone()).collect();
        let info = FunctionInfo::new(names, body);
        let _ = self.scopes.define(name.val().clone(), Symbol::Function(info));

        let defined_in = self.scopes.current();
        let enclosing = self.function.replace((defined_in, name.val().clone()));

        let inferred = self.ephemeral(|this| {
            for parameter in parameters {
                let symbol = Symbol::Variable {
                    typ: Type::Unknown,
                    initialized: true,
                };

                if let Err(id) = this.scopes.define(parameter.val().clone(), symbol) {
                    fail!(parameter.location(), SemanticError::Redefinition(id));
                }
            }

            this.scan_block(body)?;

            // Los parámetros pudieron adquirir un tipo durante el análisis del cuerpo
            let scope = this.scopes.current();
            let inferred: Vec<_> = parameters
                .iter()
                .map(|parameter| {
                    let id = parameter.val();
                    let typ = this
                        .scopes
                        .get(scope, id.as_ref())
                        .map(Symbol::typ)
                        .unwrap_or_default();

                    (id.clone(), typ)
                })
                .collect();

            Ok(inferred)
        });

        self.function = enclosing;
        let inferred = inferred?;

        if let Some(Symbol::Function(info)) = self.scopes.get_mut(defined_in, name.as_ref().as_ref()) {
            info.parameter_types.extend(inferred);

            debug!(
                function = %name.val(),
                parameters = ?info.signature(),
                returns = %info.return_type,
                "inferred function signature"
            );
        }

        Ok(())
    }

    fn return_statement(
        &mut self,
        value: Option<&'ast Located<Expr>>,
        location: &Location,
    ) -> Semantic<()> {
        let (scope, function) = match &self.function {
            Some(current) => current.clone(),
            None => fail!(location, SemanticError::ReturnOutsideFunction),
        };

        let found = match value {
            Some(value) => Some(self.eval(value)?),
            None => None,
        };

        let info = match self.scopes.get_mut(scope, function.as_ref()) {
            Some(Symbol::Function(info)) => info,
            _ => unreachable!("current function `{}` is not in its defining scope", function),
        };

        match found {
            None if !info.return_type.is_known() => info.return_type = Type::Void,
            None => (),

            Some(found) => {
                let previous = info.return_type;
                if previous.is_known() && found.is_known() && previous != found {
                    let error = SemanticError::ConflictingReturn {
                        function,
                        previous,
                        found,
                    };

                    fail!(location, error);
                }

                if found.is_known() {
                    info.return_type = found;
                }
            }
        }

        Ok(())
    }

    fn call(&mut self, call: &'ast Call) -> Semantic<Type> {
        let Call { function, args } = call;

        let (signature, return_type) = match self.scopes.lookup(function.as_ref().as_ref()) {
            Some(Symbol::Function(info)) => (info.signature(), info.return_type),
            Some(Symbol::Variable { .. }) => {
                fail!(function.location(), SemanticError::NotAFunction(function.val().clone()))
            }

            None => fail!(function.location(), SemanticError::Undefined(function.val().clone())),
        };

        if signature.len() != args.len() {
            let error = SemanticError::Arity {
                function: function.val().clone(),
                expected: signature.len(),
                received: args.len(),
            };

            fail!(function.location(), error);
        }

        for (index, (arg, expected)) in args.iter().zip(signature).enumerate() {
            let found = self.eval(arg)?;
            if expected.is_known() && found.is_known() && expected != found {
                let error = SemanticError::ArgumentMismatch {
                    function: function.val().clone(),
                    position: index + 1,
                    expected,
                    found,
                };

                fail!(arg.location(), error);
            }
        }

        Ok(return_type)
    }

    fn builtin(&mut self, call: &'ast BuiltinCall) -> Semantic<Type> {
        for arg in &call.args {
            self.eval(arg)?;
        }

        Ok(Type::Unknown)
    }

    fn eval(&mut self, expr: &'ast Located<Expr>) -> Semantic<Type> {
        match expr.as_ref() {
            Expr::Number(_) => Ok(Type::Number),
            Expr::Boolean(_) => Ok(Type::Boolean),
            Expr::Str(_) => Ok(Type::String),
            Expr::Id(id) => self.read(id, expr.location()),
            Expr::Call(call) => self.call(call),
            Expr::Builtin(call) => self.builtin(call),

            Expr::Unary(op, operand) => {
                let expected = match op {
                    UnOp::Not => Type::Boolean,
                    UnOp::Neg => Type::Number,
                };

                let mut found = self.eval(operand)?;
                if !found.is_known() {
                    found = self.back_patch(operand, expected);
                }

                if found.is_known() && found != expected {
                    fail!(operand.location(), SemanticError::ExpectedType(expected, found));
                }

                Ok(expected)
            }

            Expr::Binary(lhs, op, rhs) => {
                let mut left = self.eval(lhs)?;
                let mut right = self.eval(rhs)?;

                let expected = match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => Type::Number,
                    BinOp::And | BinOp::Or => Type::Boolean,

                    // Las comparaciones toleran cualquier combinación de operandos
                    BinOp::Equal
                    | BinOp::NotEqual
                    | BinOp::Less
                    | BinOp::LessOrEqual
                    | BinOp::Greater
                    | BinOp::GreaterOrEqual => return Ok(Type::Boolean),
                };

                if !left.is_known() {
                    left = self.back_patch(lhs, expected);
                }

                if !right.is_known() {
                    right = self.back_patch(rhs, expected);
                }

                if left.is_known() && right.is_known() && left != right {
                    let error = SemanticError::OperandMismatch {
                        op: *op,
                        left,
                        right,
                    };

                    fail!(expr.location(), error);
                }

                for (found, operand) in [(left, lhs), (right, rhs)] {
                    if found.is_known() && found != expected {
                        fail!(operand.location(), SemanticError::ExpectedType(expected, found));
                    }
                }

                Ok(expected)
            }
        }
    }

    fn read(&mut self, id: &Identifier, location: &Location) -> Semantic<Type> {
        match self.scopes.lookup(id.as_ref()) {
            None => fail!(location, SemanticError::Undefined(id.clone())),

            Some(Symbol::Variable {
                initialized: false, ..
            }) => fail!(location, SemanticError::Uninitialized(id.clone())),

            Some(symbol) => Ok(symbol.typ()),
        }
    }

    /// Fija el tipo de un identificador todavía desconocido al tipo que
    /// espera el operador que lo usa. Retorna el tipo resultante del operando.
    fn back_patch(&mut self, operand: &Located<Expr>, expected: Type) -> Type {
        let id = match operand.as_ref() {
            Expr::Id(id) => id,
            _ => return Type::Unknown,
        };

        match self.scopes.lookup_mut(id.as_ref()) {
            Some(Symbol::Variable { typ, .. }) if !typ.is_known() => {
                debug!(symbol = %id, typ = %expected, "back-patched operand type");

                *typ = expected;
                expected
            }

            Some(symbol) => symbol.typ(),
            None => Type::Unknown,
        }
    }

    /// Analiza un bloque en un ámbito hijo desechable.
    fn ephemeral<F, R>(&mut self, callback: F) -> Semantic<R>
    where
        F: FnOnce(&mut Self) -> Semantic<R>,
    {
        let scope = self.scopes.push();
        trace!(depth = scope.depth(), "enter scope");

        let result = callback(self);

        self.scopes.pop();
        trace!(depth = scope.depth(), "leave scope");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex, parse, source::Source};

    fn with_analysis<F>(text: &str, check: F)
    where
        F: FnOnce(Semantic<Analysis<'_>>),
    {
        let source = Source::new("test.mp", text);
        let tokens = lex::tokenize(&source).unwrap();
        let ast = parse::parse(&tokens).unwrap();

        check(ast.analyze());
    }

    fn error(text: &str) -> SemanticError {
        let mut found = None;
        with_analysis(text, |result| found = Some(result.unwrap_err().into_inner()));
        found.unwrap()
    }

    fn accepts(text: &str) {
        with_analysis(text, |result| {
            if let Err(error) = result {
                panic!("unexpected error: {}", error);
            }
        });
    }

    #[test]
    fn block_bindings_do_not_escape() {
        let error = error("x = 1\nif (x == 1):\n    y = 2\nprint(y)\n");
        assert_eq!(error, SemanticError::Undefined(Identifier::new("y")));
    }

    #[test]
    fn parameter_and_return_types_from_usage() {
        with_analysis("def f(a):\n    return a + 1\nx = f(2)\n", |result| {
            let analysis = result.unwrap();
            let f = analysis.function("f").unwrap();

            assert_eq!(f.parameter_type("a"), Some(Type::Number));
            assert_eq!(f.return_type(), Type::Number);
            assert_eq!(f.body().len(), 1);
            assert_eq!(analysis.type_of("x"), Some(Type::Number));
            assert_eq!(analysis.type_of("f"), Some(Type::Function));
        });
    }

    #[test]
    fn arity_mismatch() {
        let error = error("def f(a):\n    return a\nx = f(1, 2)\n");
        assert_eq!(
            error,
            SemanticError::Arity {
                function: Identifier::new("f"),
                expected: 1,
                received: 2
            }
        );

        let message = error.to_string();
        assert!(message.contains("expects 1"));
        assert!(message.contains("received 2"));
    }

    #[test]
    fn recursive_self_call() {
        accepts("def fact(n):\n    return fact(n)\n");
    }

    #[test]
    fn while_condition_must_be_boolean() {
        let error = error("x = 1\nwhile (x):\n    x = x\n");
        assert_eq!(
            error,
            SemanticError::NonBooleanCondition {
                construct: "while",
                found: Type::Number
            }
        );
    }

    #[test]
    fn for_condition_must_be_boolean() {
        let error = error("for (i = 0; i; i = i + 1):\n    print(i)\n");
        assert!(matches!(
            error,
            SemanticError::NonBooleanCondition {
                construct: "for",
                ..
            }
        ));

        accepts("for (;;):\n    print(1)\n");
    }

    #[test]
    fn for_bindings_do_not_escape() {
        let error = error("for (i = 0; i < 3; i = i + 1):\n    x = i\nprint(i)\n");
        assert_eq!(error, SemanticError::Undefined(Identifier::new("i")));
    }

    #[test]
    fn assignment_type_mismatch() {
        let error = error("x = 1\nx = True\n");
        assert_eq!(
            error,
            SemanticError::AssignmentMismatch {
                target: Identifier::new("x"),
                expected: Type::Number,
                found: Type::Boolean
            }
        );
    }

    #[test]
    fn assignment_to_unknown_resolves_it() {
        with_analysis("x = input()\nx = \"text\"\n", |result| {
            assert_eq!(result.unwrap().type_of("x"), Some(Type::String));
        });
    }

    #[test]
    fn outer_variables_are_updated_from_blocks() {
        with_analysis("x = 1\nSEQ:\n    x = 2\n    y = x\n", |result| {
            let analysis = result.unwrap();
            assert_eq!(analysis.type_of("x"), Some(Type::Number));
            assert_eq!(analysis.type_of("y"), None);
        });
    }

    #[test]
    fn argument_type_mismatch() {
        let error = error("def f(a):\n    return a + 1\nx = f(True)\n");
        assert_eq!(
            error,
            SemanticError::ArgumentMismatch {
                function: Identifier::new("f"),
                position: 1,
                expected: Type::Number,
                found: Type::Boolean
            }
        );
    }

    #[test]
    fn call_sites_do_not_infer_parameters() {
        with_analysis("def f(a):\n    return a\nx = f(1)\n", |result| {
            let analysis = result.unwrap();
            let f = analysis.function("f").unwrap();

            assert_eq!(f.parameter_type("a"), Some(Type::Unknown));
            assert_eq!(f.return_type(), Type::Unknown);
        });
    }

    #[test]
    fn callee_must_be_a_function() {
        assert_eq!(
            error("x = 1\ny = x(2)\n"),
            SemanticError::NotAFunction(Identifier::new("x"))
        );

        assert_eq!(error("y = g(2)\n"), SemanticError::Undefined(Identifier::new("g")));
    }

    #[test]
    fn return_outside_function() {
        assert_eq!(error("return 1\n"), SemanticError::ReturnOutsideFunction);
    }

    #[test]
    fn conflicting_returns() {
        let error = error("def f(x):\n    if (x > 1):\n        return 1\n    return True\n");
        assert_eq!(
            error,
            SemanticError::ConflictingReturn {
                function: Identifier::new("f"),
                previous: Type::Number,
                found: Type::Boolean
            }
        );

        assert!(matches!(
            super::tests::error("def g():\n    return\n    return 1\n"),
            SemanticError::ConflictingReturn {
                previous: Type::Void,
                ..
            }
        ));
    }

    #[test]
    fn bare_return_is_void() {
        with_analysis("def f():\n    print(1)\n    return\nx = f()\n", |result| {
            let analysis = result.unwrap();
            assert_eq!(analysis.function("f").unwrap().return_type(), Type::Void);
            assert_eq!(analysis.type_of("x"), Some(Type::Void));
        });
    }

    #[test]
    fn nested_functions_restore_the_enclosing_one() {
        let text = "def outer(a):\n    def inner(b):\n        return b + 1\n    return a and True\n";
        with_analysis(text, |result| {
            let analysis = result.unwrap();
            let outer = analysis.function("outer").unwrap();

            assert_eq!(outer.return_type(), Type::Boolean);
            assert_eq!(outer.parameter_type("a"), Some(Type::Boolean));
            assert!(analysis.symbol("inner").is_none());
        });
    }

    #[test]
    fn function_redefinition() {
        let error = error("def f():\n    return\ndef f():\n    return\n");
        assert_eq!(error, SemanticError::Redefinition(Identifier::new("f")));

        let error = super::tests::error("def g(a, a):\n    return\n");
        assert_eq!(error, SemanticError::Redefinition(Identifier::new("a")));
    }

    #[test]
    fn channel_redeclaration_is_accepted() {
        with_analysis("x = 1\nc_channel link x y\nc_channel link x y\n", |result| {
            let analysis = result.unwrap();
            assert_eq!(analysis.type_of("link"), Some(Type::Channel));
            assert_eq!(analysis.type_of("y"), Some(Type::Channel));
            assert_eq!(analysis.type_of("x"), Some(Type::Number));
        });
    }

    #[test]
    fn logical_operands_are_back_patched() {
        with_analysis("def f(a, b):\n    return a and not b\n", |result| {
            let analysis = result.unwrap();
            let f = analysis.function("f").unwrap();

            assert_eq!(f.signature(), vec![Type::Boolean, Type::Boolean]);
            assert_eq!(f.return_type(), Type::Boolean);
        });
    }

    #[test]
    fn operator_type_errors() {
        assert_eq!(
            error("x = 1 + True\n"),
            SemanticError::OperandMismatch {
                op: BinOp::Add,
                left: Type::Number,
                right: Type::Boolean
            }
        );

        assert_eq!(
            error("x = \"a\" + \"b\"\n"),
            SemanticError::ExpectedType(Type::Number, Type::String)
        );

        assert_eq!(
            error("x = not 1\n"),
            SemanticError::ExpectedType(Type::Boolean, Type::Number)
        );
    }

    #[test]
    fn comparisons_tolerate_mixed_operands() {
        with_analysis("x = 1 == \"a\"\ny = input() < 3\n", |result| {
            let analysis = result.unwrap();
            assert_eq!(analysis.type_of("x"), Some(Type::Boolean));
            assert_eq!(analysis.type_of("y"), Some(Type::Boolean));
        });
    }

    #[test]
    fn first_error_in_statement_order_wins() {
        assert_eq!(error("y = a\nz = b\n"), SemanticError::Undefined(Identifier::new("a")));
        assert_eq!(error("y = 1 + b\nz = a\n"), SemanticError::Undefined(Identifier::new("b")));
    }

    #[test]
    fn uninitialized_read() {
        let source = Source::new("test.mp", "x\n");
        let location = Location::at(source, Default::default());
        let expr = Located::at(Expr::Id(Identifier::new("x")), location);

        let mut context = Context::new();
        let symbol = Symbol::Variable {
            typ: Type::Number,
            initialized: false,
        };
        context.scopes.define(Identifier::new("x"), symbol).unwrap();

        let error = context.eval(&expr).unwrap_err().into_inner();
        assert_eq!(error, SemanticError::Uninitialized(Identifier::new("x")));

        let mut context = Context::new();
        let error = context.eval(&expr).unwrap_err().into_inner();
        assert_eq!(error, SemanticError::Undefined(Identifier::new("x")));
    }

    #[test]
    fn errors_carry_locations() {
        let source = Source::new("test.mp", "x = 1\ny = x + True\n");
        let tokens = lex::tokenize(&source).unwrap();
        let ast = parse::parse(&tokens).unwrap();

        let error = ast.analyze().unwrap_err();
        assert_eq!(error.location().start().line(), 2);
        assert_eq!(error.location().start().column(), 5);
    }
}
