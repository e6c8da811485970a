use super::*;
use murk_verification::Verifier;

fn jumps_only() -> ObfuscationConfig {
    ObfuscationConfig {
        loops_to_jumps: true,
        ..ObfuscationConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_counted_loop_keeps_its_order() {
    let result = obfuscate(COUNTER, jumps_only(), FIXED_SEED).await;
    let execution = Verifier::new().run(&result.source, "Посчитать", &[]).unwrap();
    let expected: Vec<String> = (0..=100).map(|n| n.to_string()).collect();
    assert_eq!(execution.output, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_only_for_each_loops_remain() {
    let result = obfuscate(COUNTER, jumps_only(), FIXED_SEED).await;
    assert_eq!(result.source.matches("КонецЦикла").count(), 1, "{}", result.source);
    assert!(result.source.contains("Для Каждого"));
    assert!(result.source.contains("Перейти"));
    assert_eq!(result.stats.loops_rewritten, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_break_and_continue_keep_their_targets() {
    let result = obfuscate(COUNTER, jumps_only(), FIXED_SEED).await;
    let execution = Verifier::new().run(&result.source, "Вложенные", &[]).unwrap();
    assert_eq!(execution.output, ["1:1", "2:1", "а", "б"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loops_in_garbage_are_jumps_too() {
    let config = ObfuscationConfig {
        inject_garbage: true,
        ..jumps_only()
    };
    for seed in SEEDS {
        let result = obfuscate(COUNTER, config.clone(), seed).await;
        assert_eq!(result.source.matches("КонецЦикла").count(), 1, "seed {seed}");
        assert_equivalent(COUNTER, &result.source, "Вложенные", &[]);
    }
}
