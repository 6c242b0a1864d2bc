//! SHA-256 tree hash over 1 MiB leaves.
//!
//! Leaves are digests of consecutive 1 MiB blocks. Each level above pairs adjacent
//! nodes left to right and digests the concatenation of their raw bytes; an
//! unpaired trailing node moves up unchanged. The level whose node span equals the
//! part size gives the per-part digests the vault reports back for each upload.

use crate::backup::glacier::chunk_plan::MIB;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use rayon::prelude::*;
use sha2::{Digest as _, Sha256};
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    fn combine(left: &Digest, right: &Digest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compares against a hex checksum as returned by the vault.
    pub fn matches_hex<S: AsRef<str>>(&self, checksum: S) -> bool {
        hex::decode(checksum.as_ref().trim())
            .map(|bytes| bytes == self.0)
            .unwrap_or(false)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

#[derive(Clone, Debug)]
pub struct TreeHash {
    leaves: Vec<Digest>,
    parts: Vec<Digest>,
    root: Digest,
}

impl TreeHash {
    /// Streams `reader` once. `part_size` must be a power-of-two multiple of 1 MiB.
    pub fn from_reader<R: Read>(mut reader: R, part_size: u64) -> Result<Self> {
        debug_assert!(part_size >= MIB && part_size.is_power_of_two());

        let mut leaves = Vec::new();
        let mut block = Vec::with_capacity(MIB as usize);
        loop {
            block.clear();
            let read = reader.by_ref().take(MIB).read_to_end(&mut block)?;
            if read == 0 {
                break;
            }
            leaves.push(Digest::of(&block));
        }
        if leaves.is_empty() {
            leaves.push(Digest::of(&[]));
        }

        let part_span = part_size / MIB;
        let mut span = 1;
        let mut level = leaves.clone();
        let mut parts = None;
        loop {
            if span == part_span {
                parts = Some(level.clone());
            }
            if level.len() == 1 {
                break;
            }
            level = reduce_level(&level);
            span *= 2;
        }
        let root = level[0];
        let parts = parts.unwrap_or_else(|| vec![root]);

        Ok(Self { leaves, parts, root })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, part_size: u64) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| Self::from_reader(BufReader::new(f), part_size))
            .add_msg(format!("Unable to hash file {:?}", path))
    }

    /// Root digest of an in-memory buffer.
    pub fn root_of(data: &[u8]) -> Digest {
        let mut level = if data.is_empty() {
            vec![Digest::of(&[])]
        } else {
            data.chunks(MIB as usize).map(Digest::of).collect()
        };
        while level.len() > 1 {
            level = reduce_level(&level);
        }
        level[0]
    }

    pub fn leaves(&self) -> &[Digest] {
        &self.leaves
    }

    /// Digest of each part, in offset order.
    pub fn parts(&self) -> &[Digest] {
        &self.parts
    }

    pub fn root(&self) -> Digest {
        self.root
    }
}

fn reduce_level(level: &[Digest]) -> Vec<Digest> {
    level
        .par_chunks(2)
        .map(|pair| match pair {
            [left, right] => Digest::combine(left, right),
            [single] => *single,
            _ => unreachable!("chunks of two"),
        })
        .collect()
}
