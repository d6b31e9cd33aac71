use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Synchronous destination for encoded log lines.
///
/// Every write holds the lock for the whole line and flushes before
/// releasing it, so concurrent callers never interleave partial lines.
/// Swapping the destination takes the same lock.
pub struct Sink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Sink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Sink {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Sink writing to the process's standard error.
    pub fn stderr() -> Self {
        Sink::new(io::stderr())
    }

    /// Write one complete line.
    ///
    /// **Returns**
    /// - `Ok(())` once the bytes were written and flushed.
    /// - `Err(..)` if the destination failed; the line may be partially
    ///   written in that case.
    pub fn write(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line)?;
        writer.flush()
    }

    /// Replace the destination. Lines already written are unaffected.
    pub fn set_output<W: Write + Send + 'static>(&self, writer: W) {
        *self.writer.lock().unwrap_or_else(PoisonError::into_inner) = Box::new(writer);
    }
}

impl Default for Sink {
    fn default() -> Self {
        Sink::stderr()
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn set_output_redirects_subsequent_writes() {
        let first = Shared::default();
        let second = Shared::default();
        let sink = Sink::new(first.clone());

        sink.write(b"one\n").unwrap();
        sink.set_output(second.clone());
        sink.write(b"two\n").unwrap();

        assert_eq!(&*first.0.lock().unwrap(), b"one\n");
        assert_eq!(&*second.0.lock().unwrap(), b"two\n");
    }

    #[test]
    fn write_errors_are_returned() {
        let sink = Sink::new(Broken);
        let err = sink.write(b"line\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
