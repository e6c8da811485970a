use super::*;

#[tokio::test(flavor = "multi_thread")]
async fn test_same_seed_same_module() {
    let first = obfuscate(ORDERS, ObfuscationConfig::all(2), FIXED_SEED).await;
    let second = obfuscate(ORDERS, ObfuscationConfig::all(2), FIXED_SEED).await;
    assert_eq!(first.source, second.source);
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.seed, FIXED_SEED);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_different_seeds_differ() {
    let first = obfuscate(ORDERS, ObfuscationConfig::all(1), SEEDS[1]).await;
    let second = obfuscate(ORDERS, ObfuscationConfig::all(1), SEEDS[2]).await;
    assert_ne!(first.source, second.source);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_result_serializes_with_flat_stats() {
    let result = obfuscate(TEXT, ObfuscationConfig::all(0), FIXED_SEED).await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["seed"], FIXED_SEED);
    assert!(json["strings_hidden"].as_u64().unwrap() > 0);
    assert!(json["before"]["routine_cnt"].as_u64().is_some());
}
