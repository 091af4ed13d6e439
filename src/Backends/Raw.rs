// Line-oriented input reader. Each line becomes a one-column record.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use crate::error::{BackendError, BackendResult};
use crate::Structs::Value_Structs::{BackendInfo, Record, Schema, TypeTag, Value};
use crate::Threading::Backend::{Backend, BackendContext};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Read the file once at init.
    Manual,
    /// Read the whole file again whenever its mtime changes.
    Reread,
    /// Follow the file, reading lines appended since the last beat.
    Stream,
}

impl FromStr for ReadMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ReadMode::Manual),
            "reread" => Ok(ReadMode::Reread),
            "stream" => Ok(ReadMode::Stream),
            other => Err(BackendError::Config(format!("unsupported read mode {other}"))),
        }
    }
}

/// Options: `mode` (`manual`, `reread`, `stream`; default `manual`) and
/// `separator` (a single byte, default newline).
pub struct RawReader {
    path: PathBuf,
    mode: ReadMode,
    separator: u8,
    file: Option<BufReader<File>>,
    mtime: Option<SystemTime>,
    /// Bytes of a line still waiting for its separator (stream mode).
    partial: Vec<u8>,
    finished: bool,
}

impl Default for RawReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RawReader {
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            mode: ReadMode::Manual,
            separator: b'\n',
            file: None,
            mtime: None,
            partial: Vec::new(),
            finished: false,
        }
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    fn reopen(&mut self) -> BackendResult {
        let file = File::open(&self.path)
            .map_err(|e| BackendError::Failed(format!("cannot open {}: {e}", self.path.display())))?;
        self.file = Some(BufReader::new(file));
        self.partial.clear();
        Ok(())
    }

    /// Deliver whatever the current mode says is new. A full read ends with
    /// end-of-data; a stream update only does when it produced lines.
    fn update(&mut self, ctx: &mut BackendContext) -> BackendResult {
        match self.mode {
            ReadMode::Reread => {
                let modified = fs::metadata(&self.path)
                    .and_then(|m| m.modified())
                    .map_err(|e| BackendError::Failed(format!("could not stat {}: {e}", self.path.display())))?;
                if self.mtime.is_some_and(|seen| modified <= seen) {
                    return Ok(());
                }
                self.mtime = Some(modified);
                self.reopen()?;
            }
            ReadMode::Manual => self.reopen()?,
            ReadMode::Stream => {
                if self.file.is_none() {
                    self.reopen()?;
                }
            }
        }

        let lines = self.read_lines(ctx)?;
        if self.mode != ReadMode::Stream || lines > 0 {
            ctx.end_of_data();
        }
        Ok(())
    }

    /// Returns the number of lines delivered.
    fn read_lines(&mut self, ctx: &mut BackendContext) -> Result<usize, BackendError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };

        let mut lines = 0;
        loop {
            let read = file.read_until(self.separator, &mut self.partial)?;
            if read == 0 {
                break;
            }

            if self.partial.last() != Some(&self.separator) {
                // Unterminated tail; a streamed file may still be growing.
                if self.mode == ReadMode::Stream {
                    break;
                }
            } else {
                self.partial.pop();
            }

            let line = String::from_utf8_lossy(&self.partial).into_owned();
            self.partial.clear();
            let record: Record = vec![Value::string(line)];
            ctx.put(record);
            lines += 1;
        }
        Ok(lines)
    }
}

impl Backend for RawReader {
    fn init(&mut self, ctx: &mut BackendContext, info: &BackendInfo, schema: &Schema) -> BackendResult {
        self.mode = info.option("mode").unwrap_or("manual").parse()?;

        if let Some(sep) = info.option("separator") {
            match sep.as_bytes() {
                [b] => self.separator = *b,
                _ => return Err(BackendError::Config("separator length has to be 1".to_string())),
            }
        }

        match schema.as_slice() {
            [field] if field.type_tag == TypeTag::String => {}
            [_] => {
                return Err(BackendError::Config(
                    "raw reader field must be of type string".to_string(),
                ))
            }
            _ => {
                return Err(BackendError::Config(
                    "raw reader takes exactly one string field".to_string(),
                ))
            }
        }

        self.path = PathBuf::from(&info.path);
        self.update(ctx)
    }

    fn write(&mut self, _ctx: &mut BackendContext, _records: Vec<Record>) -> BackendResult {
        Err(BackendError::Unsupported("write on an input reader"))
    }

    fn set_buffering(&mut self, _ctx: &mut BackendContext, _enabled: bool) -> BackendResult {
        Ok(())
    }

    fn flush(&mut self, _ctx: &mut BackendContext) -> BackendResult {
        Ok(())
    }

    fn rotate(
        &mut self,
        ctx: &mut BackendContext,
        _rotated_path: &str,
        _open: f64,
        _close: f64,
        _terminating: bool,
    ) -> BackendResult {
        ctx.warning("input readers have nothing to rotate");
        Ok(())
    }

    fn finish(&mut self, _ctx: &mut BackendContext) -> BackendResult {
        self.finished = true;
        self.file = None;
        self.partial.clear();
        Ok(())
    }

    fn heartbeat(&mut self, ctx: &mut BackendContext, _network_time: f64, _current_time: f64) {
        if self.finished || self.mode == ReadMode::Manual || self.path.as_os_str().is_empty() {
            return;
        }

        // Heartbeats cannot fail the thread; report and try again next beat.
        if let Err(e) = self.update(ctx) {
            ctx.error(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!("manual".parse::<ReadMode>().unwrap(), ReadMode::Manual);
        assert_eq!("reread".parse::<ReadMode>().unwrap(), ReadMode::Reread);
        assert_eq!("stream".parse::<ReadMode>().unwrap(), ReadMode::Stream);
        assert!("tail".parse::<ReadMode>().is_err());
    }
}
