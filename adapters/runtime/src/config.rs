use std::{fs, path::Path};

use anyhow::Context;
use grimhold_core::Tuning;

/// Reads and validates a TOML tuning document from disk.
pub fn load_tuning(path: &Path) -> anyhow::Result<Tuning> {
    let document = fs::read_to_string(path)
        .with_context(|| format!("failed to read tuning file {}", path.display()))?;
    Tuning::from_toml_str(&document)
        .with_context(|| format!("invalid tuning file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    fn tuning_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file created");
        file.write_all(contents.as_bytes()).expect("temp file written");
        file.flush().expect("temp file flushed");
        file
    }

    #[test]
    fn loads_overrides_from_disk() {
        let file = tuning_file("rng_seed = 7\n");
        let tuning = load_tuning(file.path()).expect("tuning loads");

        assert_eq!(tuning.rng_seed, 7);
        assert_eq!(tuning.ground_melee, Tuning::default().ground_melee);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().expect("temp dir created");
        let path = dir.path().join("grimhold-does-not-exist.toml");
        let error = load_tuning(&path).expect_err("missing file fails");
        assert!(format!("{error}").contains("grimhold-does-not-exist.toml"));
    }

    #[test]
    fn malformed_file_reports_the_parse_error() {
        let file = tuning_file("sight = 3\n");
        let error = load_tuning(file.path()).expect_err("schema mismatch fails");

        assert!(format!("{error:#}").contains("failed to parse tuning document"));
    }
}
