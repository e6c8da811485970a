use murk_core::Seed;
use rand::RngCore;

#[test]
fn test_deterministic_rng() {
    let seed = Seed::from_hex("0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef")
        .unwrap();

    let mut rng1 = seed.stream_rng("walker");
    let mut rng2 = seed.stream_rng("walker");

    // Should produce identical sequences
    assert_eq!(rng1.next_u32(), rng2.next_u32());
    assert_eq!(rng1.next_u64(), rng2.next_u64());
}

#[test]
fn test_streams_are_independent() {
    let seed = Seed::from_hex("1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef")
        .unwrap();
    let mut walker = seed.stream_rng("walker");
    let mut oracle = seed.stream_rng("oracle-true");
    assert_ne!(walker.next_u64(), oracle.next_u64());
}

#[test]
fn test_different_seeds_different_rngs() {
    let seed1 =
        Seed::from_hex("0x1111111111111111111111111111111111111111111111111111111111111111")
            .unwrap();
    let seed2 =
        Seed::from_hex("0x2222222222222222222222222222222222222222222222222222222222222222")
            .unwrap();

    let mut rng1 = seed1.stream_rng("walker");
    let mut rng2 = seed2.stream_rng("walker");

    // Different seeds should produce different random sequences
    assert_ne!(rng1.next_u32(), rng2.next_u32());
}

#[test]
fn test_hex_round_trip_and_validation() {
    let hex = "0x1111111111111111111111111111111111111111111111111111111111111111";
    assert_eq!(Seed::from_hex(hex).unwrap().to_hex(), hex);
    assert!(matches!(
        Seed::from_hex("0x12"),
        Err(murk_core::Error::InvalidSeedLength(2))
    ));
    assert!(matches!(
        Seed::from_hex(&"zz".repeat(32)),
        Err(murk_core::Error::InvalidSeedHex)
    ));
}
