use minipar::{
    compile,
    ir::{Constant, Instruction, Operand, Program},
    lex::{self, Identifier, LexerError},
    parse::{BinOp, ParserError},
    semantic::SemanticError,
    source::Source,
    Diagnostics, Error,
};

use std::collections::HashSet;

const FACTORIAL: &str = include_str!("../demos/factorial.mp");
const LOOPS: &str = include_str!("../demos/loops.mp");
const CHANNELS: &str = include_str!("../demos/channels.mp");

fn compile_text(text: &str) -> Result<Program, Error> {
    compile(&Source::new("test.mp", text))
}

fn assert_well_formed(program: &Program) {
    let mut labels = HashSet::new();
    for instruction in program {
        if let Instruction::Label(label) = instruction {
            assert!(labels.insert(*label), "label {} placed twice", label);
        }
    }

    for target in program.iter().filter_map(Instruction::jump_target) {
        assert!(labels.contains(&target), "jump to missing label {}", target);
    }

    let mut temps = HashSet::new();
    for temp in program.iter().filter_map(Instruction::defines) {
        assert!(temps.insert(temp), "temporary {} assigned twice", temp);
    }

    assert_eq!(labels.len() as u32, program.labels());
    assert_eq!(temps.len() as u32, program.temps());
}

#[test]
fn demos_compile() {
    for demo in [FACTORIAL, LOOPS, CHANNELS] {
        let program = compile_text(demo).unwrap();
        assert!(!program.is_empty());
        assert_well_formed(&program);
    }
}

#[test]
fn end_to_end_ordering() {
    let program = compile_text("x = 1\ny = x + 2\nprint(y)\n").unwrap();
    let code = program.instructions();

    let x = Identifier::new("x");
    let y = Identifier::new("y");

    let sum = code
        .iter()
        .position(|instruction| {
            matches!(
                instruction,
                Instruction::Binary { op: BinOp::Add, lhs: Operand::Var(var), .. } if *var == x
            )
        })
        .unwrap();

    let (dst, rhs) = match &code[sum] {
        Instruction::Binary { dst, rhs, .. } => (*dst, rhs.clone()),
        _ => unreachable!(),
    };

    let load = code
        .iter()
        .position(|instruction| match instruction {
            Instruction::LoadConst { dst, value } => {
                Operand::Temp(*dst) == rhs && *value == Constant::Number("2".into())
            }

            _ => false,
        })
        .unwrap();

    let store = code
        .iter()
        .position(|instruction| *instruction == Instruction::Store { var: y.clone(), src: dst })
        .unwrap();

    let param = code
        .iter()
        .position(|instruction| *instruction == Instruction::Param(Operand::Var(y.clone())))
        .unwrap();

    let call = code
        .iter()
        .position(|instruction| {
            matches!(instruction, Instruction::Call { function, args: 1, .. } if function.as_ref() == "print")
        })
        .unwrap();

    assert!(load < sum && sum < store && store < param && param < call);
}

#[test]
fn rendered_listing() {
    let program = compile_text("c_channel c a b\nif (True):\n    x = 1\n").unwrap();

    assert_eq!(
        program.to_string(),
        "\tchannel_decl c, a, b\n\tt0 = True\n\tif_false t0 goto L0\n\tt1 = 1\n\tx = t1\nL0:\n"
    );
}

#[test]
fn lexing_is_deterministic() {
    let source = Source::new("test.mp", FACTORIAL);
    assert_eq!(lex::tokenize(&source).unwrap(), lex::tokenize(&source).unwrap());
}

#[test]
fn independent_runs_share_no_state() {
    let first = compile_text(LOOPS).unwrap();
    let second = compile_text(LOOPS).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn phase_errors_propagate() {
    match compile_text("x = 1 $ 2\n") {
        Err(Error::Lex(error)) => assert_eq!(error.val(), &LexerError::BadChar('$')),
        other => panic!("expected a lexical error, got {:?}", other),
    }

    match compile_text("x = (1 + 2\n") {
        Err(Error::Parse(error)) => {
            assert!(matches!(error.val(), ParserError::UnexpectedToken(..)))
        }

        other => panic!("expected a syntax error, got {:?}", other),
    }

    match compile_text("if (True):\n    y = 1\nz = y\n") {
        Err(Error::Semantic(error)) => {
            assert_eq!(error.val(), &SemanticError::Undefined(Identifier::new("y")));
            assert_eq!(error.location().start().line(), 3);
        }

        other => panic!("expected a semantic error, got {:?}", other),
    }
}

#[test]
fn diagnostics_name_the_phase() {
    let cases = [
        ("x = 1 !\n", "Lexical error: "),
        ("def (a):\n    return\n", "Syntax error: "),
        ("return 1\n", "Semantic error: "),
    ];

    for (text, header) in cases {
        let error = compile_text(text).unwrap_err();
        let report = Diagnostics::from(error).to_string();

        assert!(report.starts_with(header), "{}", report);
        assert!(report.contains(" --> test.mp:"));
        assert!(report.ends_with("Build failed with 1 error\n"));
    }
}
