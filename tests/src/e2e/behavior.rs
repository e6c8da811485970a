use super::*;

fn single_toggles() -> Vec<(&'static str, ObfuscationConfig)> {
    let off = ObfuscationConfig::default;
    vec![
        (
            "conditional chains",
            ObfuscationConfig {
                conditional_chains: true,
                ..off()
            },
        ),
        (
            "loops to jumps",
            ObfuscationConfig {
                loops_to_jumps: true,
                ..off()
            },
        ),
        (
            "dynamic eval",
            ObfuscationConfig {
                dynamic_eval: true,
                ..off()
            },
        ),
        (
            "hide strings",
            ObfuscationConfig {
                hide_strings: true,
                ..off()
            },
        ),
        (
            "randomize conditions",
            ObfuscationConfig {
                randomize_conditions: true,
                ..off()
            },
        ),
        (
            "inject garbage",
            ObfuscationConfig {
                inject_garbage: true,
                ..off()
            },
        ),
        (
            "call stack",
            ObfuscationConfig {
                call_stack_depth: 3,
                ..off()
            },
        ),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disabled_run_preserves_behavior() {
    let [orders, text, counter] = obfuscate_samples(ObfuscationConfig::default(), FIXED_SEED).await;
    assert_eq!(orders.stats, Default::default());
    assert_samples_equivalent(&orders.source, &text.source, &counter.source);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_each_technique_preserves_behavior() {
    let reprinted = obfuscate(ORDERS, ObfuscationConfig::default(), FIXED_SEED).await;
    for (name, config) in single_toggles() {
        tracing::info!("checking {name}");
        let [orders, text, counter] = obfuscate_samples(config, FIXED_SEED).await;
        assert_ne!(orders.source, reprinted.source, "{name} changed nothing");
        assert_samples_equivalent(&orders.source, &text.source, &counter.source);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_all_techniques_preserve_behavior() {
    for seed in SEEDS {
        let [orders, text, counter] = obfuscate_samples(ObfuscationConfig::all(2), seed).await;
        assert!(orders.potency_delta > 0.0, "seed {seed}");
        assert_samples_equivalent(&orders.source, &text.source, &counter.source);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_strings_are_not_visible() {
    let config = ObfuscationConfig {
        hide_strings: true,
        ..ObfuscationConfig::default()
    };
    let result = obfuscate(ORDERS, config, FIXED_SEED).await;
    for literal in ["Ошибка деления", "В работе", "Итого: ", "срочный"] {
        assert!(ORDERS.contains(literal));
        assert!(!result.source.contains(literal), "{literal} is still visible");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_stack_adds_functions() {
    let config = ObfuscationConfig {
        call_stack_depth: 3,
        ..ObfuscationConfig::default()
    };
    let result = obfuscate(COUNTER, config, FIXED_SEED).await;
    let functions = result.source.matches("КонецФункции").count();
    assert!(functions >= 4, "{}", result.source);
    assert!(result.stats.routines_synthesized >= 3);
    assert_equivalent(COUNTER, &result.source, "Ответ", &[]);
}
