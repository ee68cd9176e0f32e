//! Behavioural scenarios for the layered pipeline, run through `CipherJob`.

use cpme_core::{CipherConfig, CpmeError, Direction, Instruction, MAX_DIMENSION};
use cpme_engine::{CipherJob, Stage};
use proptest::prelude::*;

fn config(max_dimension: usize, threads: usize) -> CipherConfig {
    CipherConfig {
        max_dimension,
        threads,
    }
}

fn run(
    data: &[u8],
    instructions: &[(usize, &str, bool)],
    direction: Direction,
    cfg: &CipherConfig,
) -> Vec<u8> {
    let mut job = CipherJob::from_bytes(data.to_vec(), cfg).unwrap();
    let list = instructions
        .iter()
        .map(|(mode, key, check)| Instruction::new(*mode, *key, *check).unwrap())
        .collect();
    job.set_instructions(list).unwrap();
    job.run(direction).unwrap();
    job.bytes().to_vec()
}

fn sorted(bytes: &[u8]) -> Vec<u8> {
    let mut v = bytes.to_vec();
    v.sort_unstable();
    v
}

#[test]
fn two_fixed_chunks_share_one_permutation() {
    let cfg = config(MAX_DIMENSION, 1);
    let plain: Vec<u8> = (0..10).collect();
    let cipher = run(&plain, &[(5, "abc", true)], Direction::Encrypt, &cfg);

    assert_eq!(sorted(&cipher[..5]), vec![0, 1, 2, 3, 4]);
    assert_eq!(sorted(&cipher[5..]), vec![5, 6, 7, 8, 9]);
    // Both chunks went through the same 5×5 matrix.
    for i in 0..5 {
        assert_eq!(cipher[i + 5], cipher[i] + 5);
    }

    let back = run(&cipher, &[(5, "abc", true)], Direction::Decrypt, &cfg);
    assert_eq!(back, plain);
}

#[test]
fn neighbouring_keys_give_different_ciphertext() {
    let cfg = config(MAX_DIMENSION, 2);
    let plain: Vec<u8> = (0..=255).collect();
    let a = run(&plain, &[(64, "abc", true)], Direction::Encrypt, &cfg);
    let b = run(&plain, &[(64, "abd", true)], Direction::Encrypt, &cfg);
    assert_ne!(a, b);
    assert_eq!(sorted(&a), sorted(&b));
}

#[test]
fn layers_compose_in_order() {
    let cfg = config(MAX_DIMENSION, 1);
    let plain = b"ABCDEFGH".to_vec();
    let layered = run(
        &plain,
        &[(4, "k1", true), (4, "k2", true)],
        Direction::Encrypt,
        &cfg,
    );

    let once = run(&plain, &[(4, "k1", true)], Direction::Encrypt, &cfg);
    let twice = run(&once, &[(4, "k2", true)], Direction::Encrypt, &cfg);
    assert_eq!(layered, twice);

    let back = run(
        &layered,
        &[(4, "k1", true), (4, "k2", true)],
        Direction::Decrypt,
        &cfg,
    );
    assert_eq!(back, plain);
}

#[test]
fn ciphertext_independent_of_thread_count() {
    let plain: Vec<u8> = (0..50_000u32).map(|i| (i * 131 % 256) as u8).collect();
    let instructions = [(0, "thread-independent", true), (1000, "second", false)];
    let reference = run(&plain, &instructions, Direction::Encrypt, &config(MAX_DIMENSION, 1));
    for threads in [2, 4, 8] {
        let out = run(
            &plain,
            &instructions,
            Direction::Encrypt,
            &config(MAX_DIMENSION, threads),
        );
        assert_eq!(out, reference, "threads = {threads}");
    }
}

#[test]
fn variable_mode_round_trip_at_default_max() {
    let cfg = config(MAX_DIMENSION, 4);
    let plain: Vec<u8> = (0..70_000u32).map(|i| (i ^ (i >> 8)) as u8).collect();
    let cipher = run(&plain, &[(0, "variable", true)], Direction::Encrypt, &cfg);
    assert_ne!(cipher, plain);
    let back = run(&cipher, &[(0, "variable", true)], Direction::Decrypt, &cfg);
    assert_eq!(back, plain);
}

#[test]
fn oversized_mode_capped_at_max_dimension() {
    let cfg = config(32, 2);
    let plain: Vec<u8> = (0..100).collect();
    let capped = run(&plain, &[(10_000, "cap", true)], Direction::Encrypt, &cfg);
    let explicit = run(&plain, &[(32, "cap", true)], Direction::Encrypt, &cfg);
    assert_eq!(capped, explicit);
}

#[test]
fn failed_run_leaves_job_failed() {
    let cfg = config(64, 1);
    let mut job = CipherJob::from_bytes(vec![7; 32], &cfg).unwrap();
    job.set_instructions(vec![
        Instruction::new(8, "ok", true).unwrap(),
        Instruction::new(8, "\u{1}\u{1}\u{0}", true).unwrap(),
    ])
    .unwrap();
    assert!(matches!(
        job.run(Direction::Encrypt),
        Err(CpmeError::InvalidKey(_))
    ));
    assert_eq!(job.stage(), Stage::Failed);
    assert!(matches!(
        job.run(Direction::Decrypt),
        Err(CpmeError::JobFailed)
    ));
}

fn instruction_strategy() -> impl Strategy<Value = (usize, String, bool)> {
    (0usize..80, "[a-z]{2,8}", any::<bool>())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn encrypt_then_decrypt_restores(
        data in proptest::collection::vec(any::<u8>(), 0..3000),
        layers in proptest::collection::vec(instruction_strategy(), 1..=4),
        threads in 1usize..4,
    ) {
        prop_assume!(layers
            .iter()
            .all(|(_, key, _)| cpme_crypto::KeyScalar::derive(key).is_ok()));
        let cfg = config(64, threads);
        let build = || -> Vec<Instruction> {
            layers
                .iter()
                .map(|(mode, key, check)| Instruction::new(*mode, key.clone(), *check).unwrap())
                .collect()
        };

        let mut job = CipherJob::from_bytes(data.clone(), &cfg).unwrap();
        job.set_instructions(build()).unwrap();
        job.run(Direction::Encrypt).unwrap();
        prop_assert_eq!(sorted(job.bytes()), sorted(&data));

        let mut back = CipherJob::from_bytes(job.bytes().to_vec(), &cfg).unwrap();
        back.set_instructions(build()).unwrap();
        back.run(Direction::Decrypt).unwrap();
        prop_assert_eq!(back.bytes(), &data[..]);
    }
}
