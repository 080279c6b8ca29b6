//! Generación de IR.
//!
//! Segundo visitante del AST, independiente del análisis semántico.
//! Las sentencias se linealizan en una lista plana de instrucciones;
//! toda bifurcación se expresa con etiquetas. Las expresiones producen
//! una dirección: un temporal, una variable o una constante. Las
//! constantes deben materializarse con `LOAD_CONST` antes de usarse en
//! cualquier instrucción que espere un operando con comportamiento de
//! registro.
//!
//! Las funciones se emiten en su punto de definición, precedidas por un
//! salto que las evita durante la ejecución secuencial:
//!
//! ```text
//!     goto L1
//!     begin_func f
//!     get_param a
//!     ...
//!     return
//!     goto L0
//! L0:
//!     end_func
//! L1:
//! ```

use tracing::debug;

use crate::{
    ir::{BlockKind, Constant, Instruction, Label, Operand, Program, Temp},
    lex::Identifier,
    parse::{Assignment, Ast, Block, Call, Clause, Expr, Statement},
    source::Located,
};

/// Resultado de visitar una expresión.
#[derive(Clone, Debug, PartialEq)]
enum Address {
    Temp(Temp),
    Var(Identifier),
    Const(Constant),
}

/// Generador de IR.
///
/// Los contadores de temporales y etiquetas pertenecen a la instancia y
/// nunca se reinician. `generate()` consume el generador, por lo cual
/// cada compilación requiere una instancia nueva.
#[derive(Default)]
pub struct Generator {
    code: Vec<Instruction>,
    temps: u32,
    labels: u32,
    function_end: Option<Label>,
}

impl Ast {
    /// Genera IR para este programa.
    pub fn lower(&self) -> Program {
        Generator::new().generate(self)
    }
}

impl Generator {
    pub fn new() -> Self {
        Generator::default()
    }

    pub fn generate(mut self, ast: &Ast) -> Program {
        self.block(&ast.program);

        debug!(
            instructions = self.code.len(),
            temps = self.temps,
            labels = self.labels,
            "IR generation finished"
        );

        Program {
            code: self.code,
            temps: self.temps,
            labels: self.labels,
        }
    }

    fn output(&mut self) -> &mut Vec<Instruction> {
        &mut self.code
    }

    fn temp(&mut self) -> Temp {
        let temp = Temp(self.temps);
        self.temps += 1;
        temp
    }

    fn label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;
        label
    }

    fn block(&mut self, block: &Block) {
        for statement in block.iter() {
            self.statement(statement.val());
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assignment(assignment) => self.assign(assignment),

            Statement::If { condition, body } => {
                let end = self.label();
                let condition = self.operand(condition);

                emit!(self, Instruction::IfFalse { condition, target: end });
                self.block(body);
                emit!(self, Instruction::Label(end));
            }

            Statement::IfElse {
                condition,
                body,
                otherwise,
            } => {
                let (alternative, end) = (self.label(), self.label());
                let condition = self.operand(condition);

                emit!(
                    self,
                    Instruction::IfFalse {
                        condition,
                        target: alternative
                    }
                );

                self.block(body);
                emit!(self, Instruction::Goto(end));

                emit!(self, Instruction::Label(alternative));
                self.block(otherwise);
                emit!(self, Instruction::Label(end));
            }

            Statement::While { condition, body } => {
                let (start, end) = (self.label(), self.label());

                emit!(self, Instruction::Label(start));
                let condition = self.operand(condition);
                emit!(self, Instruction::IfFalse { condition, target: end });

                self.block(body);
                emit!(self, Instruction::Goto(start));
                emit!(self, Instruction::Label(end));
            }

            Statement::For {
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.clause(init.val());
                }

                let start = self.label();
                emit!(self, Instruction::Label(start));

                // Sin condición no hay salida del ciclo, y por tanto tampoco etiqueta final
                let end = condition.as_ref().map(|condition| {
                    let end = self.label();
                    let condition = self.operand(condition);

                    emit!(self, Instruction::IfFalse { condition, target: end });
                    end
                });

                self.block(body);
                if let Some(update) = update {
                    self.clause(update.val());
                }

                emit!(self, Instruction::Goto(start));
                if let Some(end) = end {
                    emit!(self, Instruction::Label(end));
                }
            }

            Statement::Function {
                name,
                parameters,
                body,
            } => self.function(name.val(), parameters, body),

            Statement::Call(Call { function, args }) => {
                self.call(function.val().clone(), args);
            }

            Statement::Builtin(call) => {
                self.call(Identifier::new(&call.builtin.to_string()), &call.args);
            }

            Statement::Channel { name, endpoints } => {
                let [a, b] = endpoints;
                let instruction = Instruction::ChannelDecl {
                    name: name.val().clone(),
                    endpoints: [a.val().clone(), b.val().clone()],
                };

                emit!(self, instruction);
            }

            Statement::Seq(body) => self.structured(BlockKind::Seq, body),
            Statement::Par(body) => self.structured(BlockKind::Par, body),

            Statement::Return(value) => {
                let value = value.as_ref().map(|value| self.operand(value));
                emit!(self, Instruction::Return(value));

                if let Some(end) = self.function_end {
                    emit!(self, Instruction::Goto(end));
                }
            }
        }
    }

    fn assign(&mut self, assignment: &Assignment) {
        let value = self.expr(&assignment.value);
        let src = self.register(value);

        let var = assignment.target.val().clone();
        emit!(self, Instruction::Store { var, src });
    }

    fn clause(&mut self, clause: &Clause) {
        match clause {
            Clause::Assignment(assignment) => self.assign(assignment),
            Clause::Expr(expr) => {
                self.expr(expr);
            }
        }
    }

    fn function(&mut self, name: &Identifier, parameters: &[Located<Identifier>], body: &Block) {
        let (end, skip) = (self.label(), self.label());

        emit!(self, Instruction::Goto(skip));
        emit!(self, Instruction::BeginFunc(name.clone()));

        for parameter in parameters {
            emit!(self, Instruction::GetParam(parameter.val().clone()));
        }

        let enclosing = self.function_end.replace(end);
        self.block(body);

        // Retorno implícito
        emit!(self, Instruction::Return(None));
        emit!(self, Instruction::Goto(end));
        self.function_end = enclosing;

        emit!(self, Instruction::Label(end));
        emit!(self, Instruction::EndFunc);
        emit!(self, Instruction::Label(skip));
    }

    fn structured(&mut self, kind: BlockKind, body: &Block) {
        emit!(self, Instruction::BeginBlock(kind));
        self.block(body);
        emit!(self, Instruction::EndBlock(kind));
    }

    /// Evalúa argumentos de izquierda a derecha y los empuja en orden inverso.
    fn call(&mut self, function: Identifier, args: &[Located<Expr>]) -> Temp {
        let values: Vec<_> = args.iter().map(|arg| self.operand(arg)).collect();
        let count = values.len();

        for value in values.into_iter().rev() {
            emit!(self, Instruction::Param(value));
        }

        let dst = self.temp();
        emit!(
            self,
            Instruction::Call {
                dst,
                function,
                args: count
            }
        );

        dst
    }

    fn expr(&mut self, expr: &Located<Expr>) -> Address {
        match expr.val() {
            Expr::Id(id) => Address::Var(id.clone()),
            Expr::Number(number) => Address::Const(Constant::Number(number.clone())),
            Expr::Boolean(boolean) => Address::Const(Constant::Boolean(*boolean)),
            Expr::Str(string) => Address::Const(Constant::Str(string.clone())),

            Expr::Binary(lhs, op, rhs) => {
                let lhs = self.operand(lhs);
                let rhs = self.operand(rhs);

                let dst = self.temp();
                emit!(
                    self,
                    Instruction::Binary {
                        dst,
                        op: *op,
                        lhs,
                        rhs
                    }
                );

                Address::Temp(dst)
            }

            Expr::Unary(op, operand) => {
                let operand = self.operand(operand);
                let dst = self.temp();

                emit!(self, Instruction::Unary { dst, op: *op, operand });
                Address::Temp(dst)
            }

            Expr::Call(Call { function, args }) => {
                Address::Temp(self.call(function.val().clone(), args))
            }

            Expr::Builtin(call) => {
                let function = Identifier::new(&call.builtin.to_string());
                Address::Temp(self.call(function, &call.args))
            }
        }
    }

    /// Evalúa una expresión y materializa constantes.
    fn operand(&mut self, expr: &Located<Expr>) -> Operand {
        match self.expr(expr) {
            Address::Temp(temp) => Operand::Temp(temp),
            Address::Var(var) => Operand::Var(var),
            Address::Const(value) => Operand::Temp(self.load_const(value)),
        }
    }

    /// Lleva una dirección a un temporal, como requiere `STORE`.
    fn register(&mut self, address: Address) -> Temp {
        match address {
            Address::Temp(temp) => temp,
            Address::Const(value) => self.load_const(value),

            Address::Var(var) => {
                let dst = self.temp();
                emit!(self, Instruction::LoadVar { dst, var });
                dst
            }
        }
    }

    fn load_const(&mut self, value: Constant) -> Temp {
        let dst = self.temp();
        emit!(self, Instruction::LoadConst { dst, value });
        dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::Opcode, lex, parse, source::Source};

    use std::collections::HashSet;

    fn lower(text: &str) -> Program {
        let source = Source::new("test.mp", text);
        let tokens = lex::tokenize(&source).unwrap();
        parse::parse(&tokens).unwrap().lower()
    }

    fn listing(program: &Program) -> Vec<String> {
        program.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn straight_line_code() {
        let program = lower("x = 1\ny = x + 2\nprint(y)\n");

        assert_eq!(
            listing(&program),
            [
                "t0 = 1",
                "x = t0",
                "t1 = 2",
                "t2 = x + t1",
                "y = t2",
                "param y",
                "t3 = call print, 1",
            ]
        );

        assert_eq!(program.temps(), 4);
        assert_eq!(program.labels(), 0);
    }

    #[test]
    fn variable_copies_go_through_a_temporary() {
        let program = lower("y = x\n");
        assert_eq!(listing(&program), ["t0 = x", "y = t0"]);
    }

    #[test]
    fn arguments_are_pushed_in_reverse() {
        let program = lower("r = f(a, 2, b)\n");

        assert_eq!(
            listing(&program),
            [
                "t0 = 2",
                "param b",
                "param t0",
                "param a",
                "t1 = call f, 3",
                "r = t1",
            ]
        );
    }

    #[test]
    fn if_else_layout() {
        let program = lower("if (x < 1):\n    y = 1\nelse:\n    y = 2\n");

        assert_eq!(
            listing(&program),
            [
                "t0 = 1",
                "t1 = x LT t0",
                "if_false t1 goto L0",
                "t2 = 1",
                "y = t2",
                "goto L1",
                "L0:",
                "t3 = 2",
                "y = t3",
                "L1:",
            ]
        );
    }

    #[test]
    fn while_loop_layout() {
        let program = lower("while (go):\n    go = False\n");

        assert_eq!(
            listing(&program),
            [
                "L0:",
                "if_false go goto L1",
                "t0 = False",
                "go = t0",
                "goto L0",
                "L1:",
            ]
        );
    }

    #[test]
    fn for_loop_layout() {
        let program = lower("for (i = 0; i < 3; i = i + 1):\n    print(i)\n");

        assert_eq!(
            listing(&program),
            [
                "t0 = 0",
                "i = t0",
                "L0:",
                "t1 = 3",
                "t2 = i LT t1",
                "if_false t2 goto L1",
                "param i",
                "t3 = call print, 1",
                "t4 = 1",
                "t5 = i + t4",
                "i = t5",
                "goto L0",
                "L1:",
            ]
        );
    }

    #[test]
    fn for_without_condition_has_no_exit() {
        let program = lower("for (;;):\n    print(1)\n");

        let opcodes: Vec<_> = program.iter().map(Instruction::opcode).collect();
        assert!(!opcodes.contains(&Opcode::IfFalseGoto));
        assert_eq!(program.labels(), 1);
        assert_eq!(program.instructions().last(), Some(&Instruction::Goto(Label(0))));
    }

    #[test]
    fn function_layout() {
        let program = lower("def f(a):\n    return a\nz = f(1)\n");

        assert_eq!(
            listing(&program),
            [
                "goto L1",
                "begin_func f",
                "get_param a",
                "return a",
                "goto L0",
                "return",
                "goto L0",
                "L0:",
                "end_func",
                "L1:",
                "t0 = 1",
                "param t0",
                "t1 = call f, 1",
                "z = t1",
            ]
        );
    }

    #[test]
    fn returns_jump_to_the_innermost_function() {
        let program = lower("def outer():\n    def inner():\n        return\n    return\n");
        let listing = listing(&program);

        let inner = listing.iter().position(|line| line == "begin_func inner").unwrap();
        assert_eq!(listing[inner + 1], "return");
        assert_eq!(listing[inner + 2], "goto L2");

        let close = listing.iter().position(|line| line == "L3:").unwrap();
        assert_eq!(listing[close + 1], "return");
        assert_eq!(listing[close + 2], "goto L0");
    }

    #[test]
    fn return_outside_function_does_not_jump() {
        let program = lower("return 1\n");
        assert_eq!(listing(&program), ["t0 = 1", "return t0"]);
    }

    #[test]
    fn every_jump_has_exactly_one_label() {
        let text = "def f(n):\n    while (n > 0):\n        if (n == 2):\n            return n\n        n = n - 1\n    return 0\nfor (;;):\n    x = f(3)\n";
        let program = lower(text);

        let mut defined = HashSet::new();
        for instruction in &program {
            if let Instruction::Label(label) = instruction {
                assert!(defined.insert(*label), "label {} set twice", label);
            }
        }

        for target in program.iter().filter_map(Instruction::jump_target) {
            assert!(defined.contains(&target), "dangling jump to {}", target);
        }

        let mut temps = HashSet::new();
        for temp in program.iter().filter_map(Instruction::defines) {
            assert!(temps.insert(temp), "temporary {} defined twice", temp);
        }
    }

    #[test]
    fn structured_blocks_and_channels() {
        let program = lower("c_channel link a b\nPAR:\n    SEQ:\n        x = 1\n");

        assert_eq!(
            listing(&program),
            [
                "channel_decl link, a, b",
                "# BEGIN PARALLEL BLOCK",
                "# BEGIN SEQ BLOCK",
                "t0 = 1",
                "x = t0",
                "# END SEQ BLOCK",
                "# END PARALLEL BLOCK",
            ]
        );
    }

    #[test]
    fn unary_operators() {
        let program = lower("y = not -x\n");
        assert_eq!(listing(&program), ["t0 = NEG x", "t1 = NOT t0", "y = t1"]);
    }

    #[test]
    fn numeric_constants_keep_their_lexemes() {
        let program = lower("x = 9007199254740993\ny = 007\nz = 2.50\n");

        assert_eq!(
            listing(&program),
            [
                "t0 = 9007199254740993",
                "x = t0",
                "t1 = 007",
                "y = t1",
                "t2 = 2.50",
                "z = t2",
            ]
        );
    }

    #[test]
    fn fresh_generators_restart_numbering() {
        let first = lower("x = 1\n");
        let second = lower("x = 1\n");
        assert_eq!(first, second);
    }
}
