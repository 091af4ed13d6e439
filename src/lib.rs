// Module naming follows project convention (capitalized subsystem modules)
#[allow(non_snake_case)]
pub mod Core {
    pub mod Channel;
    pub use Channel::{Channel as MessageChannel, Direction};
    mod debug;
}
#[allow(non_snake_case)]
pub mod Structs {
    pub mod Message_Structs;
    pub mod Value_Structs;
    pub use Message_Structs::{InputMessage, OutputMessage, RotationReport}; // re-export for stable path
    pub use Value_Structs::{
        BackendInfo, Field, Payload, ReaderInfo, Record, Schema, ThreadStats, TransportProto, TypeTag, Value,
        WriterInfo,
    };
}
#[allow(non_snake_case)]
pub mod Threading {
    pub mod Backend;
    pub mod EventSink;
    pub mod Frontend;
    pub mod Manager;
    pub mod WorkerThread;
    pub mod builder;
    mod debug;

    pub use self::Backend::BackendContext; // re-export for stable path
    pub use self::EventSink::LogSink;
    pub use self::WorkerThread::{JoinOutcome, ThreadHandle, ThreadState};
    pub use builder::{FrontendBuilder, ThreadingConfig, WRITER_BUFFER_SIZE};
}
#[allow(non_snake_case)]
pub mod Backends {
    pub mod Ascii;
    pub mod Raw;
    pub use Ascii::AsciiWriter;
    pub use Raw::{RawReader, ReadMode};
}
#[allow(non_snake_case)]
pub(crate) mod Debug {
    pub mod StructDebug;
}

pub mod error;

pub use error::{BackendError, BackendResult, ChannelError, FrontendError};
