//! File-backed jobs: load from disk, write under the conventional output
//! name, and decrypt the written file back to the original.

use std::path::{Path, PathBuf};

use cpme_core::naming::output_path;
use cpme_core::{CipherConfig, CpmeError, Direction, Instruction};
use cpme_engine::{append_fatal, CipherJob, Stage};
use tempfile::TempDir;

fn write_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

fn instructions() -> Vec<Instruction> {
    vec![
        Instruction::new(0, "file-key", true).unwrap(),
        Instruction::new(100, "second", true).unwrap(),
    ]
}

fn config() -> CipherConfig {
    CipherConfig {
        max_dimension: 512,
        threads: 2,
    }
}

fn process(input: &Path, direction: Direction) -> PathBuf {
    let len = std::fs::metadata(input).unwrap().len();
    let mut job = CipherJob::create(input, len, &config()).unwrap();
    job.set_instructions(instructions()).unwrap();
    job.run(direction).unwrap();
    assert_eq!(job.stage(), Stage::Complete);
    let out = output_path(input, None, direction).unwrap();
    job.write_output(&out).unwrap();
    job.close();
    out
}

#[test]
fn encrypt_decrypt_files() {
    let tmp = TempDir::new().unwrap();
    let original: Vec<u8> = (0..10_000u32).map(|i| (i * 7 + i / 300) as u8).collect();
    let src = write_test_file(tmp.path(), "report.txt", &original);

    let encrypted = process(&src, Direction::Encrypt);
    assert_eq!(encrypted, tmp.path().join("report.txt.fbz"));
    let cipher = std::fs::read(&encrypted).unwrap();
    assert_eq!(cipher.len(), original.len(), "no header, no padding");
    assert_ne!(cipher, original);

    let decrypted = process(&encrypted, Direction::Decrypt);
    assert_eq!(decrypted, tmp.path().join("d_report.txt"));
    assert_eq!(std::fs::read(&decrypted).unwrap(), original);
}

#[test]
fn empty_file_round_trips() {
    let tmp = TempDir::new().unwrap();
    let src = write_test_file(tmp.path(), "empty", b"");
    let encrypted = process(&src, Direction::Encrypt);
    assert!(std::fs::read(&encrypted).unwrap().is_empty());
    let decrypted = process(&encrypted, Direction::Decrypt);
    assert!(std::fs::read(decrypted).unwrap().is_empty());
}

#[test]
fn file_changed_since_create() {
    let tmp = TempDir::new().unwrap();
    let src = write_test_file(tmp.path(), "grows.bin", &[1u8; 10]);
    let mut job = CipherJob::create(&src, 10, &config()).unwrap();
    std::fs::write(&src, [1u8; 12]).unwrap();
    job.set_instructions(instructions()).unwrap();

    let err = job.run(Direction::Encrypt).unwrap_err();
    assert!(matches!(
        err,
        CpmeError::LengthMismatch {
            expected: 10,
            actual: 12
        }
    ));
}

#[test]
fn missing_input_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let mut job = CipherJob::create(tmp.path().join("gone"), 4, &config()).unwrap();
    job.set_instructions(instructions()).unwrap();
    assert!(matches!(job.run(Direction::Encrypt), Err(CpmeError::Io(_))));
}

#[test]
fn failed_job_is_not_written() {
    let tmp = TempDir::new().unwrap();
    let src = write_test_file(tmp.path(), "data", &[3u8; 64]);
    let mut job = CipherJob::create(&src, 64, &config()).unwrap();
    job.set_instructions(vec![Instruction::new(8, "\u{1}\u{1}\u{0}", true).unwrap()])
        .unwrap();
    let err = job.run(Direction::Encrypt).unwrap_err();

    let log = tmp.path().join("cpme_log.txt");
    append_fatal(&log, &err.to_string()).unwrap();
    assert!(std::fs::read_to_string(&log)
        .unwrap()
        .contains("invalid key"));

    let out = tmp.path().join("data.fbz");
    assert!(matches!(
        job.write_output(&out),
        Err(CpmeError::NotWritable(_))
    ));
    assert!(!out.exists());
}
