//! Binary chunk codec.
//!
//! A sequence of optional records is turned into one byte blob plus an
//! offset index `ptr` of length `n + 1`. Record `i` occupies
//! `bytes[ptr[i]..ptr[i + 1]]` and is compressed on its own, so a client can
//! fetch a single HTTP range and inflate it without touching its neighbours.
//! An absent record contributes no bytes: `ptr[i] == ptr[i + 1]`.
//!
//! There is no distinction between an absent record and a present one that
//! compresses to nothing; an empty range always reads back as `None`.

use serde::Serialize;

use crate::compress::{self, Algorithm};
use crate::{LoopyError, Result};

/// Concatenated compressed records and their offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedBlob {
    /// Monotonic offsets, `ptr[0] == 0`, one more entry than there are records.
    pub ptr: Vec<u64>,
    /// All compressed records back to back.
    pub bytes: Vec<u8>,
}

impl ChunkedBlob {
    /// Number of records (present or absent).
    pub fn len(&self) -> usize {
        self.ptr.len().saturating_sub(1)
    }

    /// Whether the blob indexes no records at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte range of record `i`, or `None` if `i` is out of bounds.
    pub fn range(&self, i: usize) -> Option<std::ops::Range<usize>> {
        if i + 1 >= self.ptr.len() {
            return None;
        }
        Some(self.ptr[i] as usize..self.ptr[i + 1] as usize)
    }

    /// Decompress record `i`. Returns `Ok(None)` for an absent record.
    pub fn record(&self, i: usize) -> Result<Option<Vec<u8>>> {
        let range = self.range(i).ok_or_else(|| {
            LoopyError::InvalidInput(format!(
                "chunk {i} out of bounds for {} records",
                self.len()
            ))
        })?;
        read_record(&self.bytes, range)
    }
}

/// Decompress the record stored at `range` of `bytes`.
///
/// Shared by the in-memory [`ChunkedBlob`] and readers over memory-mapped
/// `.bin` files.
pub fn read_record(bytes: &[u8], range: std::ops::Range<usize>) -> Result<Option<Vec<u8>>> {
    if range.is_empty() {
        return Ok(None);
    }
    let slice = bytes.get(range.clone()).ok_or_else(|| {
        LoopyError::InvalidInput(format!(
            "chunk range {}..{} exceeds blob of {} bytes",
            range.start,
            range.end,
            bytes.len()
        ))
    })?;
    compress::decompress(slice).map(Some)
}

/// Compress each present record independently and concatenate the results.
pub fn concat<I, B>(records: I, algorithm: Algorithm) -> Result<ChunkedBlob>
where
    I: IntoIterator<Item = Option<B>>,
    B: AsRef<[u8]>,
{
    let compressed = records
        .into_iter()
        .map(|r| r.map(|r| algorithm.compress(r.as_ref())).transpose())
        .collect::<Result<Vec<_>>>()?;
    Ok(ChunkedBlob::from_compressed(compressed))
}

impl ChunkedBlob {
    /// Assemble records that were already compressed one by one, e.g. on a
    /// worker pool.
    pub fn from_compressed<I, B>(records: I) -> ChunkedBlob
    where
        I: IntoIterator<Item = Option<B>>,
        B: AsRef<[u8]>,
    {
        let records = records.into_iter();
        let mut ptr = Vec::with_capacity(records.size_hint().0 + 1);
        ptr.push(0u64);
        let mut bytes = Vec::new();
        let mut curr = 0u64;

        for record in records {
            if let Some(record) = record {
                let record = record.as_ref();
                curr += record.len() as u64;
                bytes.extend_from_slice(record);
            }
            ptr.push(curr);
        }

        ChunkedBlob { ptr, bytes }
    }
}

/// [`concat`] over JSON-serializable records.
pub fn concat_json<I, T>(records: I, algorithm: Algorithm) -> Result<ChunkedBlob>
where
    I: IntoIterator<Item = Option<T>>,
    T: Serialize,
{
    let encoded = records
        .into_iter()
        .map(|r| r.map(|r| serde_json::to_vec(&r)).transpose())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    concat(encoded, algorithm)
}

/// [`concat`] over records given as comma-joined fields.
pub fn concat_csv<I, S>(records: I, algorithm: Algorithm) -> Result<ChunkedBlob>
where
    I: IntoIterator<Item = Option<Vec<S>>>,
    S: AsRef<str>,
{
    let encoded = records.into_iter().map(|r| {
        r.map(|fields| {
            fields
                .iter()
                .map(|f| f.as_ref())
                .collect::<Vec<_>>()
                .join(",")
                .into_bytes()
        })
    });
    concat(encoded, algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::gzip_decompress;

    #[test]
    fn test_concat_handles_none_entries() {
        let blob = concat([Some(&b"a"[..]), None, Some(&b"bc"[..])], Algorithm::Gzip).unwrap();
        let first = Algorithm::Gzip.compress(b"a").unwrap().len() as u64;

        assert_eq!(blob.ptr[0], 0);
        assert_eq!(blob.ptr[1], first);
        assert_eq!(blob.ptr[2], first);
        assert_eq!(blob.ptr[3], blob.bytes.len() as u64);
        assert_eq!(
            gzip_decompress(&blob.bytes[..blob.ptr[1] as usize]).unwrap(),
            b"a"
        );
        assert_eq!(blob.record(1).unwrap(), None);
        assert_eq!(blob.record(2).unwrap().unwrap(), b"bc");
    }

    #[test]
    fn test_concat_empty_sequence() {
        let blob = concat(Vec::<Option<Vec<u8>>>::new(), Algorithm::Gzip).unwrap();
        assert_eq!(blob.ptr, vec![0]);
        assert!(blob.bytes.is_empty());
        assert!(blob.is_empty());
    }

    #[test]
    fn test_record_out_of_bounds() {
        let blob = concat([Some(b"x".to_vec())], Algorithm::Gzip).unwrap();
        assert!(blob.record(1).is_err());
    }

    #[test]
    fn test_concat_json() {
        #[derive(Serialize)]
        struct Sparse {
            index: Vec<usize>,
            value: Vec<f64>,
        }
        let blob = concat_json(
            [
                Some(Sparse {
                    index: vec![1],
                    value: vec![0.5],
                }),
                None,
            ],
            Algorithm::Gzip,
        )
        .unwrap();
        let raw = blob.record(0).unwrap().unwrap();
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            r#"{"index":[1],"value":[0.5]}"#
        );
        assert_eq!(blob.ptr[1], blob.ptr[2]);
    }

    #[test]
    fn test_concat_csv() {
        let blob = concat_csv(
            [Some(vec!["a", "b"]), None, Some(vec!["c"])],
            Algorithm::Zstd,
        )
        .unwrap();
        assert_eq!(blob.record(0).unwrap().unwrap(), b"a,b");
        assert_eq!(blob.record(2).unwrap().unwrap(), b"c");
    }

    #[test]
    fn test_from_compressed_matches_concat() {
        let raw = [Some(b"abc".to_vec()), None, Some(b"d".to_vec())];
        let pre: Vec<Option<Vec<u8>>> = raw
            .iter()
            .map(|r| r.as_ref().map(|b| Algorithm::Gzip.compress(b).unwrap()))
            .collect();
        assert_eq!(
            ChunkedBlob::from_compressed(pre),
            concat(raw, Algorithm::Gzip).unwrap()
        );
    }

    #[test]
    fn test_read_record_rejects_overrun() {
        assert!(read_record(b"abc", 1..10).is_err());
        assert_eq!(read_record(b"abc", 2..2).unwrap(), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn records() -> impl Strategy<Value = Vec<Option<Vec<u8>>>> {
        proptest::collection::vec(
            proptest::option::of(proptest::collection::vec(any::<u8>(), 1..64)),
            0..24,
        )
    }

    proptest! {
        #[test]
        fn every_present_record_roundtrips(recs in records()) {
            let blob = concat(recs.iter().map(|r| r.as_deref()), Algorithm::Gzip).unwrap();
            prop_assert_eq!(blob.ptr.len(), recs.len() + 1);
            prop_assert_eq!(blob.ptr[0], 0);
            prop_assert!(blob.ptr.windows(2).all(|w| w[0] <= w[1]));
            for (i, rec) in recs.iter().enumerate() {
                match rec {
                    Some(bytes) => {
                        let got = blob.record(i).unwrap();
                        prop_assert_eq!(got.as_ref(), Some(bytes));
                    }
                    None => prop_assert_eq!(blob.ptr[i], blob.ptr[i + 1]),
                }
            }
        }
    }
}
