//! Text sniffing for file reads.

/// Bytes inspected when deciding whether a file is text.
pub const SNIFF_LEN: usize = 512;

const BINARY_SIGNATURES: &[&[u8]] = &[
    b"%PDF-",
    b"%!PS-Adobe-",
    b"\x89PNG\r\n\x1a\n",
    b"GIF87a",
    b"GIF89a",
    b"\xFF\xD8\xFF",
    b"PK\x03\x04",
    b"\x1F\x8B\x08",
];

/// Returns true when the leading bytes of `content` look like text.
///
/// Known binary signatures and control bytes other than tab, newline, form
/// feed, carriage return and escape mark the content as binary. Empty content
/// is text.
#[must_use]
pub fn looks_like_text(content: &[u8]) -> bool {
    let head = content.get(..SNIFF_LEN).unwrap_or(content);
    if BINARY_SIGNATURES
        .iter()
        .any(|signature| head.starts_with(signature))
    {
        return false;
    }
    !head.iter().copied().any(is_binary_byte)
}

const fn is_binary_byte(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
