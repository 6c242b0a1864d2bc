use crate::backup::glacier::client::PartBody;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, IntoInnerError, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Where a part is staged between extraction and upload.
///
/// Memory keeps one part per worker in RAM; with large part sizes a temp file is
/// the cheaper choice.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "scratch_type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum ScratchConfig {
    Memory,
    TempFile {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self::TempFile { dir: None }
    }
}

/// A private copy of one part. Temp files are deleted when this is dropped.
#[derive(Debug)]
pub enum Scratch {
    Memory(Vec<u8>),
    TempFile(NamedTempFile),
}

impl Scratch {
    pub fn body(&self) -> PartBody<'_> {
        match self {
            Scratch::Memory(bytes) => PartBody::Memory(bytes),
            Scratch::TempFile(file) => PartBody::File(file.path()),
        }
    }
}

impl ScratchConfig {
    /// Copies `[offset, offset + size)` of `archive` into a fresh scratch.
    pub fn extract<P: AsRef<Path>>(&self, archive: P, offset: u64, size: u64) -> Result<Scratch> {
        let archive = archive.as_ref();
        self.extract_inner(archive, offset, size)
            .add_msg(format!(
                "Unable to extract {} bytes at offset {} from {:?}",
                size, offset, archive
            ))
    }

    fn extract_inner(&self, archive: &Path, offset: u64, size: u64) -> Result<Scratch> {
        let mut input = File::open(archive)?;
        input.seek(SeekFrom::Start(offset))?;
        let mut input = input.take(size);

        let (scratch, copied) = match self {
            ScratchConfig::Memory => {
                let mut buf = Vec::with_capacity(size as usize);
                let copied = input.read_to_end(&mut buf)? as u64;
                (Scratch::Memory(buf), copied)
            }
            ScratchConfig::TempFile { dir } => {
                let tmp = match dir {
                    Some(dir) => NamedTempFile::new_in(dir)?,
                    None => NamedTempFile::new()?,
                };
                let mut writer = BufWriter::new(tmp);
                let copied = std::io::copy(&mut input, &mut writer)?;
                writer.flush()?;
                let tmp = writer.into_inner().map_err(IntoInnerError::into_error)?;
                (Scratch::TempFile(tmp), copied)
            }
        };

        if copied != size {
            return Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("archive ended after {copied} of {size} bytes"),
            )));
        }
        Ok(scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("archive.tar");
        std::fs::write(&path, (0..100u8).collect::<Vec<_>>()).unwrap();
        path
    }

    #[test]
    fn test_extract_into_memory() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchConfig::Memory.extract(archive(&dir), 10, 5).unwrap();
        assert_eq!(scratch.body().bytes().unwrap().as_ref(), &[10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_extract_into_temp_file_is_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let scratch_dir = TempDir::new().unwrap();
        let config = ScratchConfig::TempFile {
            dir: Some(scratch_dir.path().to_path_buf()),
        };

        let scratch = config.extract(archive(&dir), 95, 5).unwrap();
        assert_eq!(scratch.body().bytes().unwrap().as_ref(), &[95, 96, 97, 98, 99]);
        assert_eq!(std::fs::read_dir(scratch_dir.path()).unwrap().count(), 1);

        drop(scratch);
        assert_eq!(std::fs::read_dir(scratch_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extract_past_end_fails() {
        let dir = TempDir::new().unwrap();
        let result = ScratchConfig::Memory.extract(archive(&dir), 90, 20);
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_missing_archive_fails() {
        let result = ScratchConfig::default().extract("/nonexistent/archive.tar", 0, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_scratch_config_deserialization() {
        let config: ScratchConfig = serde_yml::from_str("scratch_type: memory\n").unwrap();
        assert_eq!(config, ScratchConfig::Memory);

        let config: ScratchConfig =
            serde_yml::from_str("scratch_type: temp_file\ndir: /var/tmp\n").unwrap();
        assert_eq!(
            config,
            ScratchConfig::TempFile {
                dir: Some(PathBuf::from("/var/tmp"))
            }
        );

        let config: ScratchConfig = serde_yml::from_str("scratch_type: temp_file\n").unwrap();
        assert_eq!(config, ScratchConfig::default());
    }
}
