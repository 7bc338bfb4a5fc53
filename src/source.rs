//! Line loading and streaming
//!
//! Inputs are strict UTF-8. Lines are split on `\n`, `\r\n` and lone `\r`;
//! the terminator is not part of the line and a final terminator does not
//! produce a trailing empty line.

use crate::error::{LinedupError, Result, Stage};
use chardetng::EncodingDetector;
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Bytes sampled when guessing the encoding of an invalid input
const DETECT_SAMPLE: usize = 64 * 1024;

/// A line read from the source, with its zero-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub index: u64,
    pub text: String,
}

/// Read a whole input into memory, one entry per line
pub fn load_all(path: &Path, stage: Stage) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| LinedupError::io(path, stage, e))?;
    let start = bom_len(&bytes);
    validate_utf8(path, stage, &bytes, start)?;

    let mut lines = Vec::new();
    let mut position = start;
    while let Some(line) = next_line(&bytes, &mut position) {
        lines.push(String::from_utf8_lossy(line).into_owned());
    }
    Ok(lines)
}

/// Open a lazy, indexed line stream over an input
///
/// The whole input is validated before the stream is returned, so a stream
/// that opened successfully yields every line without further errors.
pub fn stream(path: &Path, stage: Stage) -> Result<LineStream> {
    LineStream::open(path, stage)
}

/// Memory-mapped line iterator
///
/// The mapping lives exactly as long as the stream; dropping the stream
/// early releases the file.
pub struct LineStream {
    mmap: Option<Mmap>,
    position: usize,
    index: u64,
}

impl LineStream {
    fn open(path: &Path, stage: Stage) -> Result<Self> {
        let file = File::open(path).map_err(|e| LinedupError::io(path, stage, e))?;
        let size = file
            .metadata()
            .map_err(|e| LinedupError::io(path, stage, e))?
            .len();

        // Zero-length files cannot be mapped on every platform
        let mmap = if size == 0 {
            None
        } else {
            let mmap =
                unsafe { Mmap::map(&file) }.map_err(|e| LinedupError::io(path, stage, e))?;
            Some(mmap)
        };

        let bytes = mmap.as_deref().unwrap_or(&[]);
        let position = bom_len(bytes);
        validate_utf8(path, stage, bytes, position)?;

        Ok(Self {
            mmap,
            position,
            index: 0,
        })
    }

    /// Total size of the input in bytes
    pub fn total_bytes(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// Bytes consumed so far
    pub fn bytes_read(&self) -> u64 {
        self.position as u64
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }
}

impl Iterator for LineStream {
    type Item = SourceLine;

    fn next(&mut self) -> Option<Self::Item> {
        let mut position = self.position;
        let text = {
            let line = next_line(self.bytes(), &mut position)?;
            String::from_utf8_lossy(line).into_owned()
        };
        self.position = position;

        let line = SourceLine {
            index: self.index,
            text,
        };
        self.index += 1;
        Some(line)
    }
}

/// Cut the next line out of `bytes`, advancing `position` past its terminator
fn next_line<'a>(bytes: &'a [u8], position: &mut usize) -> Option<&'a [u8]> {
    if *position >= bytes.len() {
        return None;
    }

    let remaining = &bytes[*position..];
    match memchr::memchr2(b'\n', b'\r', remaining) {
        Some(end) => {
            let terminator = if remaining[end] == b'\r' && remaining.get(end + 1) == Some(&b'\n') {
                2
            } else {
                1
            };
            *position += end + terminator;
            Some(&remaining[..end])
        }
        None => {
            *position = bytes.len();
            Some(remaining)
        }
    }
}

/// Number of terminators in `bytes`, with `\r\n` counted once
fn count_line_breaks(bytes: &[u8]) -> usize {
    memchr::memchr2_iter(b'\n', b'\r', bytes)
        .filter(|&i| !(bytes[i] == b'\n' && i > 0 && bytes[i - 1] == b'\r'))
        .count()
}

fn bom_len(bytes: &[u8]) -> usize {
    if bytes.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    }
}

fn validate_utf8(path: &Path, stage: Stage, bytes: &[u8], start: usize) -> Result<()> {
    let content = &bytes[start..];
    match std::str::from_utf8(content) {
        Ok(_) => Ok(()),
        Err(e) => {
            let valid = &content[..e.valid_up_to()];
            let line = count_line_breaks(valid) + 1;
            Err(LinedupError::Encoding {
                path: path.to_path_buf(),
                stage,
                line,
                detected: detect_encoding(content),
            })
        }
    }
}

/// Guess the encoding of content that failed UTF-8 validation
fn detect_encoding(content: &[u8]) -> Option<&'static str> {
    let sample = &content[..content.len().min(DETECT_SAMPLE)];
    let mut detector = EncodingDetector::new();
    detector.feed(sample, sample.len() == content.len());

    let encoding = detector.guess(None, true);
    if encoding == encoding_rs::UTF_8 {
        None
    } else {
        Some(encoding.name())
    }
}
