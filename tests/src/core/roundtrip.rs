use murk_core::ast::{Declaration, Statement};
use murk_core::{BslCodec, PrintConfig, SourceCodec};

const ORDERS: &str = include_str!("../../bsl/orders.bsl");
const TEXT: &str = include_str!("../../bsl/text.bsl");
const COUNTER: &str = include_str!("../../bsl/counter.bsl");

fn statements(source: &str) -> Vec<Statement> {
    let module = BslCodec.parse(source).unwrap();
    module
        .declarations
        .into_iter()
        .filter_map(|declaration| match declaration {
            Declaration::Routine(routine) => Some(routine.body),
            Declaration::Variables(_) => None,
        })
        .flatten()
        .collect()
}

#[test]
fn test_printing_is_stable() {
    for source in [ORDERS, TEXT, COUNTER] {
        let module = BslCodec.parse(source).unwrap();
        let printed = BslCodec.print(&module, PrintConfig::default());
        let reparsed = BslCodec.parse(&printed).unwrap();
        assert_eq!(reparsed, module, "reprinting changed the tree");
        assert_eq!(BslCodec.print(&reparsed, PrintConfig::default()), printed);
    }
}

#[test]
fn test_one_line_output_parses_back() {
    let module = BslCodec.parse(ORDERS).unwrap();
    let config = PrintConfig {
        one_line: true,
        margin: 0,
    };
    let printed = BslCodec.print(&module, config);
    assert!(!printed.trim_end().contains('\n') || printed.contains("\n|"));
    assert_eq!(BslCodec.parse(&printed).unwrap(), module);
}

#[test]
fn test_serialized_statements_parse_back() {
    for statement in statements(ORDERS).into_iter().chain(statements(TEXT)) {
        let text = BslCodec.serialize_statement(&statement);
        assert!(!text.ends_with(';'), "serialized text carries a terminator: {text}");
        let reparsed = BslCodec.parse_statements(&text).unwrap();
        assert_eq!(reparsed, vec![statement.clone()], "{text}");
        assert_eq!(BslCodec.serialize_statement(&reparsed[0]), text);
    }
}

#[test]
fn test_syntax_errors_carry_a_position() {
    let err = BslCodec
        .parse("Процедура П()\n    А = ;\nКонецПроцедуры")
        .unwrap_err();
    match err {
        murk_core::Error::Parse { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
}
