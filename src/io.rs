use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};

/// Read everything from `reader` and split it into lines. `\n`, `\r\n` and a
/// lone `\r` all end a line; invalid UTF-8 is replaced lossily.
pub fn read_lines<R: Read>(mut reader: R) -> io::Result<Vec<String>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(split_lines(&data))
}

fn split_lines(data: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match memchr::memchr2(b'\n', b'\r', &data[pos..]) {
            Some(off) => {
                let end = pos + off;
                lines.push(line_from_bytes(&data[pos..end]));
                pos = if data[end] == b'\r' && data.get(end + 1) == Some(&b'\n') {
                    end + 2
                } else {
                    end + 1
                };
            }
            None => {
                // Last line without terminator
                lines.push(line_from_bytes(&data[pos..]));
                pos = data.len();
            }
        }
    }
    lines
}

fn line_from_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Read input lines from `path`, or from stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<Vec<String>> {
    match path {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("open {}", p.display()))?;
            read_lines(file).with_context(|| format!("read {}", p.display()))
        }
        None => read_lines(io::stdin().lock()).context("read stdin"),
    }
}

/// Read the whole input as text, from `path` or stdin.
pub fn read_text(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("read {}", p.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .lock()
                .read_to_string(&mut text)
                .context("read stdin")?;
            Ok(text)
        }
    }
}
