// Tab-separated log writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{BackendError, BackendResult};
use crate::Structs::Value_Structs::{BackendInfo, Payload, Record, Schema, TypeTag, Value};
use crate::Threading::Backend::{Backend, BackendContext};

const DEFAULT_SEPARATOR: &str = "\t";
const DEFAULT_SET_SEPARATOR: &str = ",";
const DEFAULT_EMPTY_FIELD: &str = "(empty)";
const DEFAULT_UNSET_FIELD: &str = "-";

/// Writes one `<path>.log` file per frontend under a base directory.
///
/// Options: `separator`, `set_separator`, `empty_field`, `unset_field`.
pub struct AsciiWriter {
    dir: PathBuf,
    path: Option<PathBuf>,
    file: Option<BufWriter<File>>,
    log_path: String,
    schema: Schema,
    separator: String,
    set_separator: String,
    empty_field: String,
    unset_field: String,
    buffered: bool,
}

impl AsciiWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            path: None,
            file: None,
            log_path: String::new(),
            schema: Schema::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            set_separator: DEFAULT_SET_SEPARATOR.to_string(),
            empty_field: DEFAULT_EMPTY_FIELD.to_string(),
            unset_field: DEFAULT_UNSET_FIELD.to_string(),
            buffered: true,
        }
    }

    /// File currently written to, if open.
    pub fn current_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open(&mut self) -> BackendResult {
        let path = self.dir.join(format!("{}.log", self.log_path));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut file = BufWriter::new(file);
        self.write_header(&mut file)?;
        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    fn close(&mut self) -> BackendResult {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn write_header(&self, out: &mut impl Write) -> std::io::Result<()> {
        let escaped: String = self.separator.bytes().map(|b| format!("\\x{b:02x}")).collect();
        writeln!(out, "#separator {escaped}")?;

        let sep = &self.separator;
        writeln!(out, "#set_separator{sep}{}", self.set_separator)?;
        writeln!(out, "#empty_field{sep}{}", self.empty_field)?;
        writeln!(out, "#unset_field{sep}{}", self.unset_field)?;
        writeln!(out, "#path{sep}{}", self.log_path)?;

        let names: Vec<&str> = self.schema.iter().map(|f| f.name.as_str()).collect();
        writeln!(out, "#fields{sep}{}", names.join(sep))?;

        let types: Vec<String> = self.schema.iter().map(|f| f.type_name()).collect();
        writeln!(out, "#types{sep}{}", types.join(sep))
    }

    pub(crate) fn format_value(&self, value: &Value, out: &mut String) {
        if !value.present {
            out.push_str(&self.unset_field);
            return;
        }

        match &value.payload {
            Payload::None => out.push_str(&self.unset_field),
            Payload::Bool(b) => out.push(if *b { 'T' } else { 'F' }),
            Payload::Int(i) => out.push_str(&i.to_string()),
            Payload::Count(n) => out.push_str(&n.to_string()),
            Payload::Port { port, .. } => out.push_str(&port.to_string()),
            Payload::Addr(addr) => out.push_str(&addr.to_string()),
            Payload::Subnet { prefix, width } => out.push_str(&format!("{prefix}/{width}")),
            Payload::Double(d) => match value.type_tag {
                TypeTag::Time | TypeTag::Interval => out.push_str(&format!("{d:.6}")),
                _ => out.push_str(&d.to_string()),
            },
            Payload::String(s) if s.is_empty() => out.push_str(&self.empty_field),
            Payload::String(s) => out.push_str(&self.escape(s)),
            Payload::Set(items) | Payload::Vector(items) => {
                if items.is_empty() {
                    out.push_str(&self.empty_field);
                    return;
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(&self.set_separator);
                    }
                    self.format_value(item, out);
                }
            }
        }
    }

    fn escape(&self, s: &str) -> String {
        if !s.contains(self.separator.as_str()) {
            return s.to_string();
        }
        let escaped: String = self.separator.bytes().map(|b| format!("\\x{b:02x}")).collect();
        s.replace(self.separator.as_str(), &escaped)
    }
}

impl Backend for AsciiWriter {
    fn init(&mut self, _ctx: &mut BackendContext, info: &BackendInfo, schema: &Schema) -> BackendResult {
        for (key, target) in [
            ("separator", &mut self.separator),
            ("set_separator", &mut self.set_separator),
            ("empty_field", &mut self.empty_field),
            ("unset_field", &mut self.unset_field),
        ] {
            if let Some(value) = info.option(key) {
                if value.is_empty() {
                    return Err(BackendError::Config(format!("{key} must not be empty")));
                }
                *target = value.to_string();
            }
        }

        if info.path.is_empty() {
            return Err(BackendError::Config("log path is empty".to_string()));
        }

        self.log_path = info.path.clone();
        self.schema = schema.clone();
        fs::create_dir_all(&self.dir)?;
        self.open()
    }

    fn write(&mut self, ctx: &mut BackendContext, records: Vec<Record>) -> BackendResult {
        let mut line = String::new();
        for record in &records {
            if record.len() != self.schema.len() {
                ctx.error(format!(
                    "dropping row with {} values, expected {}",
                    record.len(),
                    self.schema.len()
                ));
                continue;
            }

            line.clear();
            for (i, value) in record.iter().enumerate() {
                if i > 0 {
                    line.push_str(&self.separator);
                }
                self.format_value(value, &mut line);
            }
            line.push('\n');

            let file = self
                .file
                .as_mut()
                .ok_or_else(|| BackendError::Failed("write to closed log".to_string()))?;
            file.write_all(line.as_bytes())?;
        }

        if !self.buffered {
            self.flush(ctx)?;
        }
        Ok(())
    }

    fn set_buffering(&mut self, _ctx: &mut BackendContext, enabled: bool) -> BackendResult {
        self.buffered = enabled;
        Ok(())
    }

    fn flush(&mut self, _ctx: &mut BackendContext) -> BackendResult {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
            file.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn rotate(
        &mut self,
        _ctx: &mut BackendContext,
        rotated_path: &str,
        _open: f64,
        _close: f64,
        terminating: bool,
    ) -> BackendResult {
        self.close()?;

        if let Some(current) = self.path.take() {
            fs::rename(&current, self.dir.join(rotated_path))?;
        }

        if !terminating {
            self.open()?;
        }
        Ok(())
    }

    fn finish(&mut self, _ctx: &mut BackendContext) -> BackendResult {
        self.close()
    }

    fn heartbeat(&mut self, _ctx: &mut BackendContext, _network_time: f64, _current_time: f64) {}
}
