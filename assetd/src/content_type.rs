//! Content-Type resolution for served assets.
//!
//! A file's type comes from a fixed extension table first. Extensions that are not in the table
//! fall back to sniffing the first [`SNIFF_LEN`] bytes of the file against a list of well-known
//! signatures, following the WHATWG MIME sniffing rules as implemented by common HTTP servers:
//! HTML and XML markup, documents, images, audio and video, fonts, and archives. Data that matches
//! none of them is `text/plain` unless it holds control bytes, in which case it is
//! `application/octet-stream`.

use std::path::Path;

/// Number of leading bytes considered when sniffing
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Recognized extensions, lowercase with the leading dot. No other extension is mapped.
const EXTENSIONS: &[(&str, &str)] = &[
    (".css", "text/css; charset=utf-8"),
    (".gif", "image/gif"),
    (".htm", TEXT_HTML),
    (".html", TEXT_HTML),
    (".jpeg", "image/jpeg"),
    (".jpg", "image/jpeg"),
    (".js", "application/javascript"),
    (".mjs", "application/javascript"),
    (".pdf", "application/pdf"),
    (".png", "image/png"),
    (".svg", "image/svg+xml"),
    (".wasm", "application/wasm"),
    (".webp", "image/webp"),
    (".xml", "text/xml; charset=utf-8"),
];

/// Looks up a dot-prefixed extension (e.g. `.PNG` or `.png`) in the extension table.
pub fn for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    EXTENSIONS.iter().find(|(known, _)| *known == ext).map(|(_, mime)| *mime)
}

/// Content type of `path` according to the extension table alone. `None` means the caller has
/// to [`sniff`] the file's contents.
pub fn from_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| for_extension(&format!(".{ext}")))
}

/// How a [`Signature`] recognizes its data.
enum Rule {
    /// `mask` is applied to the data before comparing against `pattern`. An empty mask compares
    /// the data's prefix as is.
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
    },
    /// An ISO base media `ftyp` box listing an `mp4` brand
    Mp4,
}

struct Signature {
    rule: Rule,
    mime: &'static str,
}

const fn exact(pattern: &'static [u8], mime: &'static str) -> Signature {
    masked(&[], pattern, mime)
}

const fn masked(mask: &'static [u8], pattern: &'static [u8], mime: &'static str) -> Signature {
    Signature {
        rule: Rule::Masked { mask, pattern },
        mime,
    }
}

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        match self.rule {
            Rule::Masked { mask, pattern } => {
                if data.len() < pattern.len() {
                    return false;
                }
                if mask.is_empty() {
                    return data.starts_with(pattern);
                }
                data.iter()
                    .zip(mask)
                    .zip(pattern)
                    .all(|((byte, mask), expected)| byte & mask == *expected)
            }
            Rule::Mp4 => is_mp4(data),
        }
    }
}

/// The leading box must be `ftyp`, fit in `data`, and have a 4-byte aligned size. Its major brand
/// or one of its compatible brands (the minor version at offset 12 is skipped) starts with `mp4`.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|&offset| offset != 12)
        .any(|offset| data[offset..].starts_with(b"mp4"))
}

// Tags that identify an HTML document when followed by a space or `>`. Matched case-insensitively
// after leading whitespace.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const RIFF_MASK: &[u8] = b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF";

// Embedded OpenType: 34 ignored bytes, then "LP"
const EOT_MASK: &[u8] = b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xFF\xFF";
const EOT_PATTERN: &[u8] = b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00LP";

// Checked in order; the first match wins.
const SIGNATURES: &[Signature] = &[
    exact(b"%PDF-", "application/pdf"),
    exact(b"%!PS-Adobe-", "application/postscript"),
    // Byte order marks
    masked(b"\xFF\xFF\x00\x00", b"\xFE\xFF\x00\x00", "text/plain; charset=utf-16be"),
    masked(b"\xFF\xFF\x00\x00", b"\xFF\xFE\x00\x00", "text/plain; charset=utf-16le"),
    masked(b"\xFF\xFF\xFF\x00", b"\xEF\xBB\xBF\x00", TEXT_PLAIN),
    // Images
    exact(b"\x00\x00\x01\x00", "image/x-icon"),
    exact(b"\x00\x00\x02\x00", "image/x-icon"),
    exact(b"BM", "image/bmp"),
    exact(b"GIF87a", "image/gif"),
    exact(b"GIF89a", "image/gif"),
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00WEBPVP",
        "image/webp",
    ),
    exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    exact(b"\xFF\xD8\xFF", "image/jpeg"),
    // Audio and video
    masked(RIFF_MASK, b"FORM\x00\x00\x00\x00AIFF", "audio/aiff"),
    exact(b"ID3", "audio/mpeg"),
    exact(b"OggS\x00", "application/ogg"),
    exact(b"MThd\x00\x00\x00\x06", "audio/midi"),
    masked(RIFF_MASK, b"RIFF\x00\x00\x00\x00AVI ", "video/avi"),
    masked(RIFF_MASK, b"RIFF\x00\x00\x00\x00WAVE", "audio/wave"),
    Signature {
        rule: Rule::Mp4,
        mime: "video/mp4",
    },
    exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    // Fonts
    masked(EOT_MASK, EOT_PATTERN, "application/vnd.ms-fontobject"),
    exact(b"\x00\x01\x00\x00", "font/ttf"),
    exact(b"OTTO", "font/otf"),
    exact(b"ttcf", "font/collection"),
    exact(b"wOFF", "font/woff"),
    exact(b"wOF2", "font/woff2"),
    // Archives
    exact(b"\x1F\x8B\x08", "application/x-gzip"),
    exact(b"PK\x03\x04", "application/zip"),
    exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    exact(b"\x00asm", "application/wasm"),
];

/// Guesses a content type from the leading bytes of a file. Always returns a valid MIME type,
/// `application/octet-stream` when nothing matches and the data looks binary.
pub fn sniff(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let first_non_ws = data.iter().position(|b| !is_whitespace(*b)).unwrap_or(data.len());
    let trimmed = &data[first_non_ws..];

    if HTML_TAGS.iter().any(|tag| is_html_tag(trimmed, tag)) {
        return TEXT_HTML;
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some(signature) = SIGNATURES.iter().find(|s| s.matches(data)) {
        return signature.mime;
    }

    if data.iter().any(|b| is_binary(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn is_html_tag(data: &[u8], tag: &[u8]) -> bool {
    // Tag plus one terminating byte
    if data.len() < tag.len() + 1 {
        return false;
    }
    let (head, rest) = data.split_at(tag.len());
    head.eq_ignore_ascii_case(tag) && matches!(rest[0], b' ' | b'>')
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
