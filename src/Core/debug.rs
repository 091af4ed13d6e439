use super::Channel::Channel;
use std::fmt;

// Debug proxy implementation that calls the standalone debug function
impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_channel(self, f)
    }
}
