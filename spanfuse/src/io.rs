//! JSON artifact reading and writing.
//!
//! Every stage reads a complete file and writes a complete file. Output is
//! pretty-printed with two-space indentation and, unless disabled, escapes
//! every non-ASCII character as `\uXXXX` so artifacts diff cleanly against the
//! reference submission files.

use crate::config::OutputConfig;
use crate::model::{PredictionSet, validate_set};
use crate::{Result, SpanfuseError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| SpanfuseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| SpanfuseError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Read an evaluation-format prediction set and check its entities.
pub fn read_prediction_set(path: impl AsRef<Path>) -> Result<PredictionSet> {
    let path = path.as_ref();
    let set: PredictionSet = read_json(path)?;
    validate_set(&set).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "rejected prediction set");
        e
    })?;
    Ok(set)
}

/// Serialize a value to a JSON file, creating parent directories as needed.
pub fn write_json<T: Serialize>(
    path: impl AsRef<Path>,
    value: &T,
    output: &OutputConfig,
) -> Result<()> {
    let path = path.as_ref();
    let io_err = |source| SpanfuseError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file = fs::File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    to_writer(&mut writer, value, output).map_err(|source| SpanfuseError::Json {
        path: path.display().to_string(),
        source,
    })?;
    writer.flush().map_err(io_err)?;

    tracing::debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

/// Serialize a value to a string using the configured output style.
pub fn to_string<T: Serialize>(value: &T, output: &OutputConfig) -> Result<String> {
    let mut buffer = Vec::new();
    to_writer(&mut buffer, value, output).map_err(|source| SpanfuseError::Json {
        path: "<memory>".to_string(),
        source,
    })?;
    String::from_utf8(buffer).map_err(|e| SpanfuseError::Other(e.to_string()))
}

fn to_writer<W: Write, T: Serialize>(
    writer: W,
    value: &T,
    output: &OutputConfig,
) -> serde_json::Result<()> {
    let indent = vec![b' '; output.indent];
    let pretty = PrettyFormatter::with_indent(&indent);
    if output.ascii {
        let mut ser = serde_json::Serializer::with_formatter(writer, AsciiFormatter { inner: pretty });
        value.serialize(&mut ser)
    } else {
        let mut ser = serde_json::Serializer::with_formatter(writer, pretty);
        value.serialize(&mut ser)
    }
}

/// Pretty formatter that escapes non-ASCII characters.
struct AsciiFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl Formatter for AsciiFormatter<'_> {
    fn write_string_fragment<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }

    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }
}
