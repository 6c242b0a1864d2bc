//! Validation functions for configuration values.

use crate::backup::glacier::scratch::ScratchConfig;
use std::path::Path;
use validator::{Validate, ValidationError};

/// Vault names are 1-255 characters of `a-z`, `A-Z`, `0-9`, `_`, `-` and `.`.
pub fn validate_vault_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if name.is_empty() || name.len() > 255 {
        return Err(ValidationError::new("InvalidVaultName")
            .with_message("vault name must be 1 to 255 characters long".into()));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(ValidationError::new("InvalidVaultName")
            .with_message(format!("invalid character {c:?} in vault name {name:?}").into()));
    }

    Ok(())
}

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    validate_dir_exist(dir)?;
    let md = std::fs::metadata(dir).map_err(|e| {
        ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot access metadata for {:?}: {}", dir, e).into())
    })?;
    if md.permissions().readonly() {
        Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot write to dir {:?}", dir).into()))
    } else {
        Ok(())
    }
}

pub fn validate_scratch(scratch: &ScratchConfig) -> Result<(), ValidationError> {
    match scratch {
        ScratchConfig::TempFile { dir: Some(dir) } => validate_writable_dir(dir),
        _ => Ok(()),
    }
}

/// Runs the validation of a nested config section.
pub fn validate_section<T: Validate>(section: &T) -> Result<(), ValidationError> {
    section.validate().map_err(|e| {
        ValidationError::new("InvalidSection").with_message(e.to_string().into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_vault_names() {
        assert!(validate_vault_name("backups").is_ok());
        assert!(validate_vault_name("my-vault_2024.v1").is_ok());
        assert!(validate_vault_name("").is_err());
        assert!(validate_vault_name("has space").is_err());
        assert!(validate_vault_name("slash/name").is_err());
        assert!(validate_vault_name("x".repeat(256)).is_err());
    }

    #[test]
    fn test_dir_exist() {
        let dir = TempDir::new().unwrap();
        assert!(validate_dir_exist(dir.path()).is_ok());
        assert!(validate_dir_exist(dir.path().join("missing")).is_err());

        let file = dir.path().join("file");
        std::fs::write(&file, "x").unwrap();
        assert!(validate_dir_exist(&file).is_err());
    }

    #[test]
    fn test_scratch_dir() {
        let dir = TempDir::new().unwrap();
        assert!(validate_scratch(&ScratchConfig::Memory).is_ok());
        assert!(validate_scratch(&ScratchConfig::default()).is_ok());
        assert!(validate_scratch(&ScratchConfig::TempFile {
            dir: Some(dir.path().to_path_buf())
        })
        .is_ok());
        assert!(validate_scratch(&ScratchConfig::TempFile {
            dir: Some(dir.path().join("missing"))
        })
        .is_err());
    }
}
