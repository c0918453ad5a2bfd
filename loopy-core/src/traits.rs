//! Core trait definitions shared across the Loopy crates.

/// A type that can produce a summary of its contents.
pub trait Summarizable {
    /// A one-line summary suitable for display.
    fn summary(&self) -> String;
}

#[cfg(feature = "std")]
impl Summarizable for crate::chunk::ChunkedBlob {
    fn summary(&self) -> String {
        let present = self.ptr.windows(2).filter(|w| w[0] != w[1]).count();
        format!(
            "ChunkedBlob: {} chunks ({} non-empty), {} bytes",
            self.len(),
            present,
            self.bytes.len()
        )
    }
}
