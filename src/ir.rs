//! Representación intermedia.
//!
//! La IR es código de tres direcciones: una lista plana de instrucciones
//! sin bloques básicos, donde toda instrucción tiene a lo sumo dos
//! operandos fuente y un destino. Los saltos se dirigen siempre a
//! etiquetas. Los temporales y etiquetas se numeran a partir de
//! contadores propios de cada generación, ver [`crate::lower`].

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use crate::{
    lex::Identifier,
    parse::{BinOp, UnOp},
};

/// Programa completo en IR.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) code: Vec<Instruction>,
    pub(crate) temps: u32,
    pub(crate) labels: u32,
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.code.iter()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Cantidad de temporales distintos utilizados.
    pub fn temps(&self) -> u32 {
        self.temps
    }

    /// Cantidad de etiquetas distintas utilizadas.
    pub fn labels(&self) -> u32 {
        self.labels
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Listado textual, una instrucción por línea. Las etiquetas y los
/// marcadores de bloque no llevan sangría.
impl Display for Program {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.code {
            match instruction {
                Instruction::Label(_)
                | Instruction::BeginBlock(_)
                | Instruction::EndBlock(_) => writeln!(fmt, "{}", instruction)?,

                _ => writeln!(fmt, "\t{}", instruction)?,
            }
        }

        Ok(())
    }
}

/// Un temporal, `t0`, `t1`, etc.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(pub u32);

impl Display for Temp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "t{}", self.0)
    }
}

/// Una etiqueta, `L0`, `L1`, etc.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "L{}", self.0)
    }
}

/// Valor literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    /// Lexema numérico original.
    Number(Rc<str>),
    Boolean(bool),
    Str(Rc<str>),
}

impl Display for Constant {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(number) => write!(fmt, "{}", number),
            Constant::Boolean(true) => fmt.write_str("True"),
            Constant::Boolean(false) => fmt.write_str("False"),
            Constant::Str(string) => write!(fmt, "\"{}\"", string),
        }
    }
}

/// Operando con comportamiento de registro: un temporal o una variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Temp(Temp),
    Var(Identifier),
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(temp) => Display::fmt(temp, fmt),
            Operand::Var(var) => Display::fmt(var, fmt),
        }
    }
}

/// Región estructurada de `SEQ` o `PAR`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Seq,
    Par,
}

impl Display for BlockKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Seq => fmt.write_str("SEQ"),
            BlockKind::Par => fmt.write_str("PARALLEL"),
        }
    }
}

/// Conjunto cerrado de operaciones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Not,
    Neg,
    LoadConst,
    LoadVar,
    Store,
    Param,
    Call,
    Return,
    Goto,
    IfFalseGoto,
    Label,
    BeginFunc,
    EndFunc,
    GetParam,
    ChannelDecl,
    BeginSeq,
    EndSeq,
    BeginPar,
    EndPar,
}

impl Display for Opcode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Opcode::*;

        let tag = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Eq => "EQ",
            Ne => "NE",
            Lt => "LT",
            Gt => "GT",
            Le => "LE",
            Ge => "GE",
            And => "AND",
            Or => "OR",
            Not => "NOT",
            Neg => "NEG",
            LoadConst => "LOAD_CONST",
            LoadVar => "LOAD_VAR",
            Store => "STORE",
            Param => "PARAM",
            Call => "CALL",
            Return => "RETURN",
            Goto => "GOTO",
            IfFalseGoto => "IF_FALSE_GOTO",
            Opcode::Label => "LABEL",
            BeginFunc => "BEGIN_FUNC",
            EndFunc => "END_FUNC",
            GetParam => "GET_PARAM",
            ChannelDecl => "CHANNEL_DECL",
            BeginSeq => "BEGIN_SEQ",
            EndSeq => "END_SEQ",
            BeginPar => "BEGIN_PAR",
            EndPar => "END_PAR",
        };

        fmt.write_str(tag)
    }
}

impl From<BinOp> for Opcode {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Or => Opcode::Or,
            BinOp::And => Opcode::And,
            BinOp::Equal => Opcode::Eq,
            BinOp::NotEqual => Opcode::Ne,
            BinOp::Less => Opcode::Lt,
            BinOp::LessOrEqual => Opcode::Le,
            BinOp::Greater => Opcode::Gt,
            BinOp::GreaterOrEqual => Opcode::Ge,
            BinOp::Add => Opcode::Add,
            BinOp::Sub => Opcode::Sub,
            BinOp::Mul => Opcode::Mul,
            BinOp::Div => Opcode::Div,
        }
    }
}

impl From<UnOp> for Opcode {
    fn from(op: UnOp) -> Self {
        match op {
            UnOp::Not => Opcode::Not,
            UnOp::Neg => Opcode::Neg,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    LoadConst {
        dst: Temp,
        value: Constant,
    },

    LoadVar {
        dst: Temp,
        var: Identifier,
    },

    Store {
        var: Identifier,
        src: Temp,
    },

    Binary {
        dst: Temp,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },

    Unary {
        dst: Temp,
        op: UnOp,
        operand: Operand,
    },

    IfFalse {
        condition: Operand,
        target: Label,
    },

    Goto(Label),
    Label(Label),
    Param(Operand),

    Call {
        dst: Temp,
        function: Identifier,
        args: usize,
    },

    Return(Option<Operand>),
    BeginFunc(Identifier),
    EndFunc,
    GetParam(Identifier),

    ChannelDecl {
        name: Identifier,
        endpoints: [Identifier; 2],
    },

    BeginBlock(BlockKind),
    EndBlock(BlockKind),
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        use Instruction::*;

        match self {
            LoadConst { .. } => Opcode::LoadConst,
            LoadVar { .. } => Opcode::LoadVar,
            Store { .. } => Opcode::Store,
            Binary { op, .. } => Opcode::from(*op),
            Unary { op, .. } => Opcode::from(*op),
            IfFalse { .. } => Opcode::IfFalseGoto,
            Goto(_) => Opcode::Goto,
            Instruction::Label(_) => Opcode::Label,
            Param(_) => Opcode::Param,
            Call { .. } => Opcode::Call,
            Return(_) => Opcode::Return,
            BeginFunc(_) => Opcode::BeginFunc,
            EndFunc => Opcode::EndFunc,
            GetParam(_) => Opcode::GetParam,
            ChannelDecl { .. } => Opcode::ChannelDecl,
            BeginBlock(BlockKind::Seq) => Opcode::BeginSeq,
            EndBlock(BlockKind::Seq) => Opcode::EndSeq,
            BeginBlock(BlockKind::Par) => Opcode::BeginPar,
            EndBlock(BlockKind::Par) => Opcode::EndPar,
        }
    }

    /// Temporal que esta instrucción define, si alguno.
    pub fn defines(&self) -> Option<Temp> {
        use Instruction::*;

        match self {
            LoadConst { dst, .. }
            | LoadVar { dst, .. }
            | Binary { dst, .. }
            | Unary { dst, .. }
            | Call { dst, .. } => Some(*dst),

            _ => None,
        }
    }

    /// Etiqueta hacia la cual esta instrucción puede saltar, si alguna.
    pub fn jump_target(&self) -> Option<Label> {
        match self {
            Instruction::Goto(label) | Instruction::IfFalse { target: label, .. } => Some(*label),
            _ => None,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            LoadConst { dst, value } => write!(fmt, "{} = {}", dst, value),
            LoadVar { dst, var } => write!(fmt, "{} = {}", dst, var),
            Store { var, src } => write!(fmt, "{} = {}", var, src),

            Binary { dst, lhs, rhs, .. } => {
                write!(fmt, "{} = {} {} {}", dst, lhs, self.opcode(), rhs)
            }

            Unary { dst, operand, .. } => write!(fmt, "{} = {} {}", dst, self.opcode(), operand),
            IfFalse { condition, target } => write!(fmt, "if_false {} goto {}", condition, target),
            Goto(label) => write!(fmt, "goto {}", label),
            Instruction::Label(label) => write!(fmt, "{}:", label),
            Param(value) => write!(fmt, "param {}", value),

            Call {
                dst,
                function,
                args,
            } => write!(fmt, "{} = call {}, {}", dst, function, args),

            Return(None) => fmt.write_str("return"),
            Return(Some(value)) => write!(fmt, "return {}", value),
            BeginFunc(name) => write!(fmt, "begin_func {}", name),
            EndFunc => fmt.write_str("end_func"),
            GetParam(name) => write!(fmt, "get_param {}", name),

            ChannelDecl {
                name,
                endpoints: [a, b],
            } => write!(fmt, "channel_decl {}, {}, {}", name, a, b),

            BeginBlock(kind) => write!(fmt, "# BEGIN {} BLOCK", kind),
            EndBlock(kind) => write!(fmt, "# END {} BLOCK", kind),
        }
    }
}
