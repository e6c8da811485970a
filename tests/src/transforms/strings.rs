use murk_core::ast::{Directive, Expression, Literal};
use murk_core::{BslCodec, Seed, SourceCodec};
use murk_transform::strings::{decode, encode};
use murk_transform::{obfuscate_source, ObfuscationConfig};
use murk_verification::{Outcome, Verifier};

const FIXED_SEED: &str = "0x5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed";

fn hide_strings() -> ObfuscationConfig {
    let config = ObfuscationConfig {
        hide_strings: true,
        ..ObfuscationConfig::default()
    };
    config.with_seed(Seed::from_hex(FIXED_SEED).unwrap())
}

/// Collects every string literal of an expression tree.
fn strings_in(expr: &Expression, found: &mut Vec<String>) {
    match expr {
        Expression::Literal(Literal::String(value)) => found.push(value.clone()),
        Expression::Binary { left, right, .. } => {
            strings_in(left, found);
            strings_in(right, found);
        }
        Expression::Not(inner) | Expression::Neg(inner) => strings_in(inner, found),
        Expression::Call(call) => call.args.iter().for_each(|arg| strings_in(arg, found)),
        Expression::Ternary {
            condition,
            then,
            otherwise,
        } => {
            strings_in(condition, found);
            strings_in(then, found);
            strings_in(otherwise, found);
        }
        _ => {}
    }
}

#[test]
fn test_cipher_inverts_for_every_key() {
    let samples = ["", "Привет, мир!", "a\"b\"c", "таб\tи\nперевод", "🦀 ёЁ", "ВЫБРАТЬ * ИЗ Т"];
    for key in 10..100 {
        for sample in samples {
            let cipher = encode(sample, key);
            assert_eq!(decode(&cipher, key).as_deref(), Some(sample), "key {key}");
        }
    }
}

#[test]
fn test_cipher_hides_ascii_text() {
    let cipher = encode("ВЫБРАТЬ Ссылка ИЗ Справочник", 42);
    assert!(!cipher.contains("ВЫБРАТЬ"));
    assert!(decode("not base64!", 42).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_one_decoder_per_directive() {
    let source = "&НаСервере
Функция А()
    Возврат \"а\";
КонецФункции

&НаСервере
Функция Б()
    Возврат \"б\";
КонецФункции

&НаКлиенте
Процедура В()
    Сообщить(\"в\");
КонецПроцедуры

Функция Г()
    Возврат \"г\" + \"д\";
КонецФункции";
    let result = obfuscate_source(source, hide_strings()).await.unwrap();
    let module = BslCodec.parse(&result.source).unwrap();

    // Four user routines plus one decoder each for server, client and none.
    assert_eq!(module.routines().count(), 7);
    assert_eq!(result.stats.routines_synthesized, 3);
    assert_eq!(result.stats.strings_hidden, 5);

    let decoders: Vec<_> = module.routines().skip(4).collect();
    let directives: Vec<_> = decoders.iter().map(|routine| routine.directive).collect();
    assert!(directives.contains(&Some(Directive::AtServer)));
    assert!(directives.contains(&Some(Directive::AtClient)));
    assert!(directives.contains(&None));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_query_text_does_not_survive() {
    let source = include_str!("../../bsl/text.bsl");
    let result = obfuscate_source(source, hide_strings()).await.unwrap();
    assert!(source.contains("ВЫБРАТЬ"));
    assert!(!result.source.contains("ВЫБРАТЬ"));
    assert!(!result.source.contains("Справочник.Товары"));

    let module = BslCodec.parse(&result.source).unwrap();
    let query = module.routine("Запрос").unwrap();
    let mut found = Vec::new();
    for statement in &query.body {
        if let murk_core::ast::Statement::Return(Some(expr)) = statement {
            strings_in(expr, &mut found);
        }
    }
    assert!(found.iter().all(|literal| !literal.contains("ВЫБРАТЬ")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_decoded_strings_match_at_run_time() {
    let source = include_str!("../../bsl/text.bsl");
    let result = obfuscate_source(source, hide_strings()).await.unwrap();

    let verifier = Verifier::new();
    let original = verifier.run(source, "Запрос", &[]).unwrap();
    let obfuscated = verifier.run(&result.source, "Запрос", &[]).unwrap();
    assert_eq!(
        obfuscated.outcome,
        Outcome::Returned {
            kind: "Строка".into(),
            value: "ВЫБРАТЬ Товары.Ссылка ИЗ Справочник.Товары КАК Товары".into()
        }
    );
    assert!(original.same_behavior(&obfuscated));
    assert!(obfuscated.steps > original.steps);

    let original = verifier.run(source, "Показать", &[]).unwrap();
    let obfuscated = verifier.run(&result.source, "Показать", &[]).unwrap();
    assert_eq!(original.output, obfuscated.output);
}
