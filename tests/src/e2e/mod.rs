mod behavior;
mod loops;
mod reproducibility;

use murk_core::Seed;
use murk_transform::{obfuscate_source, ObfuscationConfig, ObfuscationResult};
use murk_verification::{verify_equivalence, Outcome, Value};
use std::sync::Once;

pub const ORDERS: &str = include_str!("../../bsl/orders.bsl");
pub const TEXT: &str = include_str!("../../bsl/text.bsl");
pub const COUNTER: &str = include_str!("../../bsl/counter.bsl");

pub const FIXED_SEED: &str = "0x6d75726b2d65326530303030303030303030303030303030303030303030303f";

pub const SEEDS: [&str; 3] = [
    FIXED_SEED,
    "0x0000000000000000000000000000000000000000000000000000000000000001",
    "0xfeedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedface",
];

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

pub async fn obfuscate(source: &str, config: ObfuscationConfig, seed: &str) -> ObfuscationResult {
    init_tracing();
    let config = config.with_seed(Seed::from_hex(seed).unwrap());
    obfuscate_source(source, config).await.unwrap()
}

/// Runs `entry` in both modules and fails with both transcripts on a mismatch.
pub fn assert_equivalent(original: &str, obfuscated: &str, entry: &str, args: &[Value]) {
    let report = verify_equivalence(original, obfuscated, entry, args).unwrap();
    assert!(
        matches!(report.original.outcome, Outcome::Returned { .. }),
        "{entry} failed on the original module: {:?}",
        report.original.outcome
    );
    assert!(
        report.equivalent,
        "{entry} diverged\noriginal: {:?}\nobfuscated: {:?}\n{obfuscated}",
        report.original, report.obfuscated
    );
}

/// Every entry point of the sample modules.
pub fn assert_samples_equivalent(orders: &str, text: &str, counter: &str) {
    assert_equivalent(ORDERS, orders, "Отчет", &[Value::Number(10.0)]);
    assert_equivalent(ORDERS, orders, "СуммаЗаказа", &[Value::Number(12.0), Value::Number(3.0)]);
    assert_equivalent(TEXT, text, "Показать", &[]);
    assert_equivalent(TEXT, text, "Перевернуть", &[Value::String("абв".into())]);
    assert_equivalent(COUNTER, counter, "Посчитать", &[]);
    assert_equivalent(COUNTER, counter, "Вложенные", &[]);
    assert_equivalent(COUNTER, counter, "Ответ", &[]);
}

pub async fn obfuscate_samples(config: ObfuscationConfig, seed: &str) -> [ObfuscationResult; 3] {
    [
        obfuscate(ORDERS, config.clone(), seed).await,
        obfuscate(TEXT, config.clone(), seed).await,
        obfuscate(COUNTER, config, seed).await,
    ]
}
