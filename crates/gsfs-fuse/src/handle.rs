//! Open file handles: thin pass-through readers over the cached copy.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;

use bytes::Bytes;

/// An open handle over a materialized cache file. Reads go straight to the
/// descriptor; the handle holds no other state.
pub struct FileHandle {
    file: File,
}

impl FileHandle {
    pub fn new(file: File) -> Self {
        FileHandle { file }
    }

    /// Read up to `size` bytes at `offset`. Returns fewer bytes at EOF.
    pub fn read_at(&self, offset: u64, size: u32) -> io::Result<Bytes> {
        let mut buf = vec![0u8; size as usize];
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf.into())
    }

    /// fstat the underlying descriptor.
    pub fn metadata(&self) -> io::Result<std::fs::Metadata> {
        self.file.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn handle_over(content: &[u8]) -> FileHandle {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(content).unwrap();
        FileHandle::new(tmp)
    }

    #[test]
    fn reads_at_offsets() {
        let handle = handle_over(b"hello world");
        assert_eq!(handle.read_at(0, 5).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(handle.read_at(6, 5).unwrap(), Bytes::from_static(b"world"));
    }

    #[test]
    fn short_reads_at_eof() {
        let handle = handle_over(b"abc");
        assert_eq!(handle.read_at(1, 10).unwrap(), Bytes::from_static(b"bc"));
        assert!(handle.read_at(10, 4).unwrap().is_empty());
    }
}
