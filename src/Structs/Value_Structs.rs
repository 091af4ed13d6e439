// Plain owned values that cross the engine/worker boundary.
//
// Everything here is copied or moved into a message; nothing is shared by
// reference between the two sides.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Type of a schema column or value cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Void,
    Bool,
    Int,
    Count,
    Counter,
    Port,
    Addr,
    Subnet,
    Time,
    Interval,
    Double,
    Enum,
    String,
    Set,
    Vector,
}

impl TypeTag {
    /// True for the container types that carry a subtype.
    pub fn is_container(self) -> bool {
        matches!(self, TypeTag::Set | TypeTag::Vector)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Void => "void",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Count => "count",
            TypeTag::Counter => "counter",
            TypeTag::Port => "port",
            TypeTag::Addr => "addr",
            TypeTag::Subnet => "subnet",
            TypeTag::Time => "time",
            TypeTag::Interval => "interval",
            TypeTag::Double => "double",
            TypeTag::Enum => "enum",
            TypeTag::String => "string",
            TypeTag::Set => "set",
            TypeTag::Vector => "vector",
        };
        f.write_str(name)
    }
}

/// One column of a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// Port columns read by input backends carry a second name for the protocol.
    pub secondary_name: Option<String>,
    pub type_tag: TypeTag,
    /// Element type for sets and vectors, `Void` otherwise.
    pub subtype_tag: TypeTag,
    pub optional: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            secondary_name: None,
            type_tag,
            subtype_tag: TypeTag::Void,
            optional: false,
        }
    }

    pub fn container(name: impl Into<String>, type_tag: TypeTag, subtype_tag: TypeTag) -> Self {
        Self {
            subtype_tag,
            ..Self::new(name, type_tag)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_secondary_name(mut self, name: impl Into<String>) -> Self {
        self.secondary_name = Some(name.into());
        self
    }

    /// Type name as written in log headers, e.g. `set[addr]`.
    pub fn type_name(&self) -> String {
        if self.type_tag.is_container() {
            format!("{}[{}]", self.type_tag, self.subtype_tag)
        } else {
            self.type_tag.to_string()
        }
    }
}

/// Ordered columns, fixed at init for the lifetime of a pair.
pub type Schema = Vec<Field>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransportProto {
    Unknown,
    Tcp,
    Udp,
    Icmp,
}

impl fmt::Display for TransportProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportProto::Unknown => "unknown",
            TransportProto::Tcp => "tcp",
            TransportProto::Udp => "udp",
            TransportProto::Icmp => "icmp",
        })
    }
}

/// Content of a present value cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    None,
    Bool(bool),
    Int(i64),
    Count(u64),
    Port { port: u16, proto: TransportProto },
    Addr(IpAddr),
    Subnet { prefix: IpAddr, width: u8 },
    /// Seconds since the epoch (time) or a duration in seconds (interval).
    Double(f64),
    String(String),
    Set(Vec<Value>),
    Vector(Vec<Value>),
}

/// One typed cell of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub type_tag: TypeTag,
    /// False for optional columns that are not set.
    pub present: bool,
    pub payload: Payload,
}

impl Value {
    pub fn unset(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            present: false,
            payload: Payload::None,
        }
    }

    fn present(type_tag: TypeTag, payload: Payload) -> Self {
        Self {
            type_tag,
            present: true,
            payload,
        }
    }

    pub fn bool(v: bool) -> Self {
        Self::present(TypeTag::Bool, Payload::Bool(v))
    }

    pub fn int(v: i64) -> Self {
        Self::present(TypeTag::Int, Payload::Int(v))
    }

    pub fn count(v: u64) -> Self {
        Self::present(TypeTag::Count, Payload::Count(v))
    }

    pub fn port(port: u16, proto: TransportProto) -> Self {
        Self::present(TypeTag::Port, Payload::Port { port, proto })
    }

    pub fn addr(v: IpAddr) -> Self {
        Self::present(TypeTag::Addr, Payload::Addr(v))
    }

    pub fn subnet(prefix: IpAddr, width: u8) -> Self {
        Self::present(TypeTag::Subnet, Payload::Subnet { prefix, width })
    }

    pub fn time(secs: f64) -> Self {
        Self::present(TypeTag::Time, Payload::Double(secs))
    }

    pub fn interval(secs: f64) -> Self {
        Self::present(TypeTag::Interval, Payload::Double(secs))
    }

    pub fn double(v: f64) -> Self {
        Self::present(TypeTag::Double, Payload::Double(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::present(TypeTag::String, Payload::String(v.into()))
    }

    pub fn enum_label(v: impl Into<String>) -> Self {
        Self::present(TypeTag::Enum, Payload::String(v.into()))
    }

    pub fn set(items: Vec<Value>) -> Self {
        Self::present(TypeTag::Set, Payload::Set(items))
    }

    pub fn vector(items: Vec<Value>) -> Self {
        Self::present(TypeTag::Vector, Payload::Vector(items))
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One row: a value per schema column, in schema order.
pub type Record = Vec<Value>;

/// Configuration snapshot handed to a backend at init.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendInfo {
    /// Output path for writers, source path for readers.
    pub path: String,
    /// Backend-specific named options, validated by the backend.
    pub config: HashMap<String, String>,
    /// How often the owning subsystem rotates this output, if at all.
    pub rotation_interval: Option<Duration>,
}

pub type WriterInfo = BackendInfo;
pub type ReaderInfo = BackendInfo;

impl BackendInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = Some(interval);
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }
}

/// Per-thread counters, rebuilt on demand from live thread state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThreadStats {
    /// Messages ever sent to the worker.
    pub queued_in: u64,
    /// Messages ever sent back by the worker.
    pub queued_out: u64,
    /// Messages waiting for the worker right now.
    pub pending_in: u64,
    /// Messages waiting for the engine right now.
    pub pending_out: u64,
    /// Inbound messages the worker has executed.
    pub processed: u64,
    /// Error reports, fatal or not.
    pub errors: u64,
}
