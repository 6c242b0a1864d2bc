use serde::Serialize;

/// Granularity of the hash tree and the smallest part size the vault accepts.
pub const MIB: u64 = 1024 * 1024;
/// Hard ceiling on the number of parts in one multipart upload.
pub const MAX_PART_COUNT: u64 = 10_000;

/// How an archive is cut into parts for one upload session.
///
/// `part_size_bytes` is always a power of two and at least [`MIB`], and
/// `part_count` never exceeds [`MAX_PART_COUNT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    part_size_bytes: u64,
    part_count: u64,
    archive_size_bytes: u64,
}

impl ChunkPlan {
    pub fn for_archive_size(size_bytes: u64) -> Self {
        let raw = size_bytes.div_ceil(MAX_PART_COUNT);
        let part_size_bytes = if raw <= MIB {
            MIB
        } else {
            round_up_power_of_two(raw)
        };
        let part_count = size_bytes.div_ceil(part_size_bytes).max(1);

        tracing::debug!(
            "Using part size of {} for archive of {} ({} parts)",
            crate::backup::format::format_size(part_size_bytes),
            crate::backup::format::format_size(size_bytes),
            part_count
        );

        Self {
            part_size_bytes,
            part_count,
            archive_size_bytes: size_bytes,
        }
    }

    pub fn part_size_bytes(&self) -> u64 {
        self.part_size_bytes
    }

    pub fn part_count(&self) -> u64 {
        self.part_count
    }

    pub fn archive_size_bytes(&self) -> u64 {
        self.archive_size_bytes
    }

    /// `(offset, size)` of every part in ascending offset order.
    ///
    /// A zero-size archive has no byte ranges to send even though its plan
    /// reports a single part.
    pub fn parts(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let part_size = self.part_size_bytes;
        let total = self.archive_size_bytes;
        (0..self.part_count)
            .map(move |i| i * part_size)
            .take_while(move |offset| *offset < total)
            .map(move |offset| (offset, part_size.min(total - offset)))
    }
}

fn round_up_power_of_two(value: u64) -> u64 {
    let mut v = value - 1;
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v |= v >> 32;
    v + 1
}
