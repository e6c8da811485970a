use murk_core::Seed;
use murk_transform::oracle::{classify, Oracle};
use murk_verification::{Outcome, Verifier};
use std::time::Duration;
use tokio::time::Instant;

/// Evaluates a predicate with the reference interpreter.
fn interpret(predicate: &str) -> String {
    let source = format!("Функция П()\n    Возврат {predicate};\nКонецФункции");
    match Verifier::new().run(&source, "П", &[]).unwrap().outcome {
        Outcome::Returned { value, .. } => value,
        Outcome::Raised(message) => panic!("predicate raised: {message}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_predicates_hold_for_half_a_second() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .try_init();

    let mut oracle = Oracle::spawn(&Seed::generate());
    let deadline = Instant::now() + Duration::from_millis(500);
    let mut checked = 0;
    while Instant::now() < deadline {
        let truth = oracle.recv_true().await.unwrap();
        let falsehood = oracle.recv_false().await.unwrap();
        assert_eq!(classify(&truth), Some(true), "{truth}");
        assert_eq!(classify(&falsehood), Some(false), "{falsehood}");
        checked += 1;
    }
    oracle.shutdown();
    assert!(checked > 10, "only {checked} pairs produced");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_predicates_agree_with_the_interpreter() {
    let seed = Seed::from_hex("0x0badc0de0badc0de0badc0de0badc0de0badc0de0badc0de0badc0de0badc0de")
        .unwrap();
    let mut oracle = Oracle::spawn(&seed);
    for _ in 0..50 {
        let truth = oracle.recv_true().await.unwrap();
        let falsehood = oracle.recv_false().await.unwrap();
        assert_eq!(interpret(&truth), "Да", "{truth}");
        assert_eq!(interpret(&falsehood), "Нет", "{falsehood}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_same_seed_same_predicates() {
    let seed = Seed::from_hex("0x0badc0de0badc0de0badc0de0badc0de0badc0de0badc0de0badc0de0badc0de")
        .unwrap();
    let mut first = Oracle::spawn(&seed);
    let mut second = Oracle::spawn(&seed);
    for _ in 0..20 {
        assert_eq!(first.recv_true().await.unwrap(), second.recv_true().await.unwrap());
        assert_eq!(first.recv_false().await.unwrap(), second.recv_false().await.unwrap());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_drains_then_exhausts() {
    let mut oracle = Oracle::spawn(&Seed::generate());
    oracle.recv_true().await.unwrap();
    oracle.shutdown();

    let mut drained = 0;
    while oracle.recv_true().await.is_ok() {
        drained += 1;
        assert!(drained <= 64, "queue kept producing after shutdown");
    }
    assert!(matches!(
        oracle.recv_true().await,
        Err(murk_transform::Error::OracleExhausted)
    ));
}
