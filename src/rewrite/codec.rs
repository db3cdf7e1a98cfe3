//! Content-Encoding codec.
//!
//! Decodes and encodes whole in-memory bodies for `gzip`, `deflate` and `br`.
//! Every other token, including an absent header, is identity.

use std::io::{self, Read, Write};

use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 6;
const BROTLI_LG_WINDOW: u32 = 22;

/// A `Content-Encoding` token as far as the codec is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    Gzip,
    Deflate,
    Brotli,
    #[default]
    Identity,
}

impl Encoding {
    /// Interpret a `Content-Encoding` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Encoding::Identity;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Encoding::Gzip,
            "deflate" => Encoding::Deflate,
            "br" => Encoding::Brotli,
            _ => Encoding::Identity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Brotli => "br",
            Encoding::Identity => "identity",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Encoding::Identity)
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a complete body.
pub fn decode(body: &[u8], encoding: Encoding) -> io::Result<Vec<u8>> {
    match encoding {
        Encoding::Gzip => read_all(MultiGzDecoder::new(body)),
        // Servers disagree on whether `deflate` carries the zlib wrapper
        Encoding::Deflate => {
            read_all(ZlibDecoder::new(body)).or_else(|_| read_all(DeflateDecoder::new(body)))
        }
        Encoding::Brotli => read_all(brotli::Decompressor::new(body, BROTLI_BUFFER_SIZE)),
        Encoding::Identity => Ok(body.to_vec()),
    }
}

/// Encode a complete body.
pub fn encode(body: &[u8], encoding: Encoding) -> io::Result<Vec<u8>> {
    match encoding {
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body)?;
            encoder.finish()
        }
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body)?;
            encoder.finish()
        }
        Encoding::Brotli => {
            let mut writer = brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER_SIZE,
                BROTLI_QUALITY,
                BROTLI_LG_WINDOW,
            );
            writer.write_all(body)?;
            writer.flush()?;
            Ok(writer.into_inner())
        }
        Encoding::Identity => Ok(body.to_vec()),
    }
}

fn read_all(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}
