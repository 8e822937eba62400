//! MD5 helpers (lowercase hex).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK: usize = 8 * 1024;

pub fn md5_bytes(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

pub fn md5_hex_str(s: &str) -> String {
    md5_hex(s.as_bytes())
}

/// Stream a reader through MD5 in 8 KiB chunks.
pub fn md5_hex_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut ctx = md5::Context::new();
    let mut buf = [0u8; CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

pub fn md5_hex_file(path: impl AsRef<Path>) -> io::Result<String> {
    md5_hex_reader(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn known_vectors() {
        assert_eq!(md5_hex_str(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex_str("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            md5_hex(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
        assert_eq!(md5_bytes(b"abc")[0], 0x90);
    }

    #[test]
    fn reader_matches_one_shot_across_chunks() {
        let data: Vec<u8> = (0..(CHUNK * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = md5_hex_reader(Cursor::new(&data)).expect("read");
        assert_eq!(streamed, md5_hex(&data));
    }

    #[test]
    fn file_digest() {
        let path = std::env::temp_dir().join(format!("wxopen-md5-{}.txt", std::process::id()));
        std::fs::write(&path, "abc").expect("write");
        let got = md5_hex_file(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(got.expect("digest"), "900150983cd24fb0d6963f7d28e17f72");
        assert!(md5_hex_file("/nonexistent/wxopen/file").is_err());
    }
}
