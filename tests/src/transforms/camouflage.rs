use murk_core::ast::{Expression, Literal};
use murk_core::{BslCodec, Seed, SourceCodec};
use murk_transform::camouflage::{camouflage, hide};
use murk_transform::oracle::classify;
use murk_transform::{ObfuscationConfig, Session};
use murk_verification::{Outcome, Verifier};
use std::sync::Arc;

/// Runs `f` with a seeded session on a thread that may block on the oracle.
fn with_session<T>(f: impl FnOnce(&mut Session) -> T) -> T {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let _guard = runtime.enter();
    let seed = Seed::from_hex("0xc0ffeec0ffeec0ffeec0ffeec0ffeec0ffeec0ffeec0ffeec0ffeec0ffeec0ff")
        .unwrap();
    let config = ObfuscationConfig::default().with_seed(seed);
    let mut session = Session::new(config, Arc::new(BslCodec));
    f(&mut session)
}

/// Splits a chain into its `(condition, branch)` levels and the final decoy.
fn levels(mut expr: &Expression) -> (Vec<(&Expression, &Expression)>, &Expression) {
    let mut levels = Vec::new();
    while let Expression::Ternary {
        condition,
        then,
        otherwise,
    } = expr
    {
        levels.push((&**condition, &**then));
        expr = otherwise;
    }
    (levels, expr)
}

fn evaluate(expr: &Expression) -> Outcome {
    let text = BslCodec.serialize_expression(expr);
    let source = format!("Функция П()\n    Возврат {text};\nКонецФункции");
    Verifier::new().run(&source, "П", &[]).unwrap().outcome
}

#[test]
fn test_exactly_one_live_branch() {
    with_session(|session| {
        let value = Expression::number(42.0);
        for (depth, true_step) in [(2, 0), (3, 2), (4, 1), (1, 3)] {
            let chain = camouflage(session, value.clone(), depth, true_step).unwrap();
            let (levels, last) = levels(&chain);
            let (depth, true_step) = if true_step > depth {
                (true_step, depth)
            } else {
                (depth, true_step)
            };
            assert_eq!(levels.len(), depth + 1);
            assert!(matches!(last, Expression::Literal(Literal::Number(_))));

            for (index, (condition, branch)) in levels.iter().enumerate() {
                let text = BslCodec.serialize_expression(condition);
                let live = classify(&text).unwrap();
                assert_eq!(live, index == true_step, "level {index}: {text}");
                if live {
                    assert_eq!(*branch, &value);
                }
            }
        }
    });
}

#[test]
fn test_hidden_values_evaluate_to_themselves() {
    let cases = [
        ("42", "Число", "42"),
        ("\"текст\"", "Строка", "текст"),
        ("Истина", "Булево", "Да"),
        ("2 + 3 * 4", "Число", "14"),
        ("СтрДлина(\"абв\")", "Число", "3"),
    ];
    with_session(|session| {
        for (source, kind, presentation) in cases {
            let value = BslCodec.parse_expression(source).unwrap();
            for _ in 0..5 {
                let hidden = hide(session, value.clone(), 4).unwrap();
                assert!(matches!(hidden, Expression::Ternary { .. }), "{source}");
                assert_eq!(
                    evaluate(&hidden),
                    Outcome::Returned {
                        kind: kind.to_string(),
                        value: presentation.to_string()
                    },
                    "{source}"
                );
            }
        }
        assert_eq!(session.stats.values_camouflaged, 25);
    });
}

#[test]
fn test_variables_are_left_alone() {
    with_session(|session| {
        let var = Expression::var("Итог");
        assert_eq!(hide(session, var.clone(), 4).unwrap(), var);
        assert_eq!(session.stats.values_camouflaged, 0);
    });
}
