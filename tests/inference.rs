use minipar::{
    lex::{self, Identifier},
    parse::{self, BinOp},
    semantic::{Analysis, Semantic, SemanticError, Type},
    source::Source,
};

const FACTORIAL: &str = include_str!("../demos/factorial.mp");
const CHANNELS: &str = include_str!("../demos/channels.mp");

fn analyze<F>(text: &str, check: F)
where
    F: FnOnce(Semantic<Analysis<'_>>),
{
    let source = Source::new("test.mp", text);
    let tokens = lex::tokenize(&source).unwrap();
    let ast = parse::parse(&tokens).unwrap();

    check(ast.analyze());
}

fn rejects(text: &str) -> SemanticError {
    let mut error = None;
    analyze(text, |result| error = Some(result.unwrap_err().into_inner()));
    error.unwrap()
}

#[test]
fn signatures_from_the_body() {
    analyze(FACTORIAL, |result| {
        let analysis = result.unwrap();

        for name in ["factorial", "fact"] {
            let function = analysis.function(name).unwrap();
            assert_eq!(function.parameters(), [Identifier::new("n")]);
            assert_eq!(function.signature(), [Type::Number]);
            assert_eq!(function.return_type(), Type::Number);
        }

        assert_eq!(analysis.type_of("x"), Some(Type::Number));
        assert_eq!(analysis.type_of("y"), Some(Type::Number));
        assert_eq!(analysis.type_of("result"), None);
    });
}

#[test]
fn back_patching_does_not_revisit_earlier_copies() {
    analyze("a = input()\nb = a\nc = a + 1\n", |result| {
        let analysis = result.unwrap();

        assert_eq!(analysis.type_of("a"), Some(Type::Number));
        assert_eq!(analysis.type_of("b"), Some(Type::Unknown));
        assert_eq!(analysis.type_of("c"), Some(Type::Number));
    });
}

#[test]
fn first_use_decides_the_inferred_type() {
    let arithmetic_first = rejects("def f(x):\n    y = x + 1\n    z = x and True\n");
    assert_eq!(
        arithmetic_first,
        SemanticError::OperandMismatch {
            op: BinOp::And,
            left: Type::Number,
            right: Type::Boolean
        }
    );

    let logic_first = rejects("def f(x):\n    z = x and True\n    y = x + 1\n");
    assert_eq!(
        logic_first,
        SemanticError::OperandMismatch {
            op: BinOp::Add,
            left: Type::Boolean,
            right: Type::Number
        }
    );
}

#[test]
fn parameters_assigned_in_the_body() {
    analyze("def f(a):\n    a = \"text\"\n    return a\n", |result| {
        let analysis = result.unwrap();
        let f = analysis.function("f").unwrap();

        assert_eq!(f.parameter_type("a"), Some(Type::String));
        assert_eq!(f.return_type(), Type::String);
    });
}

#[test]
fn channels_and_structured_blocks() {
    analyze(CHANNELS, |result| {
        let analysis = result.unwrap();

        for name in ["link", "sender", "receiver"] {
            assert_eq!(analysis.type_of(name), Some(Type::Channel));
        }

        assert_eq!(analysis.type_of("total"), Some(Type::Number));
        assert_eq!(analysis.type_of("a"), None);
    });

    analyze("c_channel c a b\nc_channel c a b\n", |result| {
        assert_eq!(result.unwrap().globals().len(), 3);
    });
}

#[test]
fn arity_errors_name_both_counts() {
    let error = rejects("def f(a):\n    return a\nx = f(1, 2)\n");
    assert_eq!(
        error.to_string(),
        "Function `f` expects 1 argument(s), received 2"
    );
}
