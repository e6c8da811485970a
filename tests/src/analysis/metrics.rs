use murk_analysis::{collect_metrics, compare, Error};
use murk_core::ast::Module;
use murk_core::{BslCodec, Seed, SourceCodec};
use murk_transform::{obfuscate_source, ObfuscationConfig};

const ORDERS: &str = include_str!("../../bsl/orders.bsl");

fn seeded(config: ObfuscationConfig) -> ObfuscationConfig {
    let seed = Seed::from_hex("0x5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed5eed")
        .unwrap();
    config.with_seed(seed)
}

/// Tests structural counts on a hand-written module.
#[test]
fn test_collect_metrics_orders() {
    let module = BslCodec.parse(ORDERS).unwrap();
    let metrics = collect_metrics(&module).expect("Metrics computation failed");
    assert_eq!(metrics.routine_cnt, 4, "Routine count mismatch");
    assert_eq!(metrics.loop_cnt, 3, "Loop count mismatch");
    assert_eq!(metrics.branch_cnt, 6, "Branch count mismatch");
    assert_eq!(metrics.jump_cnt, 0, "Jump count mismatch");
    assert!(metrics.string_literal_cnt >= 8, "String literals missing");
    assert!(metrics.potency > 0.0, "Potency score should be positive");
}

/// Tests that an empty module has no metrics.
#[test]
fn test_collect_metrics_empty() {
    assert!(matches!(
        collect_metrics(&Module::default()),
        Err(Error::EmptyModule)
    ));
}

/// Tests that delinearized loops are counted as jumps.
#[tokio::test(flavor = "multi_thread")]
async fn test_loops_become_jumps() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .try_init();

    let config = seeded(ObfuscationConfig {
        loops_to_jumps: true,
        ..ObfuscationConfig::default()
    });
    let result = obfuscate_source(ORDERS, config).await.unwrap();
    let before = result.before.unwrap();
    let after = result.after.unwrap();

    assert_eq!(after.loop_cnt, 1, "Only the for-each loop should remain");
    assert!(after.jump_cnt > before.jump_cnt, "Jump count should increase");
    assert!(compare(&before, &after) > 0.0, "Potency should increase");
    assert_eq!(result.stats.loops_rewritten, 2);
}

/// Tests that camouflage deepens expressions and adds branches.
#[tokio::test(flavor = "multi_thread")]
async fn test_camouflage_deepens_expressions() {
    let config = seeded(ObfuscationConfig {
        conditional_chains: true,
        ..ObfuscationConfig::default()
    });
    let result = obfuscate_source(ORDERS, config).await.unwrap();
    let before = result.before.unwrap();
    let after = result.after.unwrap();

    assert!(after.max_expr_depth > before.max_expr_depth);
    assert!(after.branch_cnt > before.branch_cnt);
    assert_eq!(after.routine_cnt, before.routine_cnt);
    assert!(result.potency_delta > 0.0);
}
