//! Output file naming
//!
//! Ciphertext carries no header or magic bytes, so file identification relies
//! entirely on these string conventions:
//!   - encrypt: `<name>.fbz` (extension appended only if absent)
//!   - decrypt: `d_<name without .fbz>`
//!
//! The output always lands next to the input file.

use std::path::{Path, PathBuf};

use crate::error::{CpmeError, CpmeResult};
use crate::types::Direction;

/// Extension appended to encrypted files
pub const ENCRYPT_EXT: &str = ".fbz";

/// Prefix prepended to decrypted files
pub const DECRYPT_TAG: &str = "d_";

/// `report.pdf` → `report.pdf.fbz`; `report.pdf.fbz` stays as is.
pub fn encrypted_name(name: &str) -> String {
    if name.ends_with(ENCRYPT_EXT) {
        name.to_string()
    } else {
        format!("{name}{ENCRYPT_EXT}")
    }
}

/// `report.pdf.fbz` → `d_report.pdf`; a name without the extension just gets the prefix.
pub fn decrypted_name(name: &str) -> String {
    let base = name.strip_suffix(ENCRYPT_EXT).unwrap_or(name);
    format!("{DECRYPT_TAG}{base}")
}

/// Resolve the output path for `input`.
///
/// `override_name` replaces the input's file name as the base. An override
/// that already carries the extension (encrypt) or the prefix (decrypt) is
/// not decorated a second time. A name that resolves back to the input
/// itself is refused, since writing it would destroy the input.
pub fn output_path(
    input: &Path,
    override_name: Option<&str>,
    direction: Direction,
) -> CpmeResult<PathBuf> {
    let input_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            CpmeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("input path has no file name: {}", input.display()),
            ))
        })?;

    let name = match (direction, override_name.filter(|s| !s.is_empty())) {
        (Direction::Encrypt, Some(o)) => encrypted_name(o),
        (Direction::Encrypt, None) => encrypted_name(&input_name),
        (Direction::Decrypt, Some(o)) if o.starts_with(DECRYPT_TAG) => o
            .strip_suffix(ENCRYPT_EXT)
            .unwrap_or(o)
            .to_string(),
        (Direction::Decrypt, Some(o)) => decrypted_name(o),
        (Direction::Decrypt, None) => decrypted_name(&input_name),
    };

    let out = match input.parent() {
        Some(dir) => dir.join(&name),
        None => PathBuf::from(&name),
    };
    if name == input_name {
        return Err(CpmeError::OutputIsInput(out));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_appends_extension_once() {
        assert_eq!(encrypted_name("notes.txt"), "notes.txt.fbz");
        assert_eq!(encrypted_name("notes.txt.fbz"), "notes.txt.fbz");
    }

    #[test]
    fn decrypt_strips_extension_and_adds_prefix() {
        assert_eq!(decrypted_name("notes.txt.fbz"), "d_notes.txt");
        assert_eq!(decrypted_name("notes.txt"), "d_notes.txt");
    }

    #[test]
    fn output_path_stays_in_input_directory() {
        let out = output_path(Path::new("/data/in/notes.txt"), None, Direction::Encrypt).unwrap();
        assert_eq!(out, PathBuf::from("/data/in/notes.txt.fbz"));

        let out =
            output_path(Path::new("/data/in/notes.txt.fbz"), None, Direction::Decrypt).unwrap();
        assert_eq!(out, PathBuf::from("/data/in/d_notes.txt"));
    }

    #[test]
    fn override_name_replaces_base() {
        let out = output_path(Path::new("dir/a.bin"), Some("b.bin"), Direction::Encrypt).unwrap();
        assert_eq!(out, PathBuf::from("dir/b.bin.fbz"));

        let out =
            output_path(Path::new("dir/a.bin.fbz"), Some("b.bin"), Direction::Decrypt).unwrap();
        assert_eq!(out, PathBuf::from("dir/d_b.bin"));
    }

    #[test]
    fn decorated_override_not_decorated_twice() {
        let out =
            output_path(Path::new("a.bin"), Some("b.bin.fbz"), Direction::Encrypt).unwrap();
        assert_eq!(out, PathBuf::from("b.bin.fbz"));

        let out =
            output_path(Path::new("a.bin.fbz"), Some("d_b.bin.fbz"), Direction::Decrypt).unwrap();
        assert_eq!(out, PathBuf::from("d_b.bin"));
    }

    #[test]
    fn output_never_resolves_to_input() {
        let err = output_path(Path::new("dir/notes.fbz"), None, Direction::Encrypt).unwrap_err();
        assert!(matches!(
            err,
            CpmeError::OutputIsInput(ref p) if p == Path::new("dir/notes.fbz")
        ));

        assert!(matches!(
            output_path(Path::new("dir/a.bin.fbz"), Some("a.bin"), Direction::Encrypt),
            Err(CpmeError::OutputIsInput(_))
        ));
        assert!(matches!(
            output_path(Path::new("dir/d_a.bin"), Some("d_a.bin"), Direction::Decrypt),
            Err(CpmeError::OutputIsInput(_))
        ));
        assert!(err.to_string().contains("overwrite the input"));
    }

    #[test]
    fn empty_override_ignored() {
        let out = output_path(Path::new("a.bin"), Some(""), Direction::Encrypt).unwrap();
        assert_eq!(out, PathBuf::from("a.bin.fbz"));
    }
}
