use std::ffi::{CString, c_char, c_void};
use std::io;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::{DEFAULT_LOG_FILTER, LOG_FILTER_ENV};

/// The host's `logprintf`.
pub type LogPrintf = unsafe extern "C" fn(format: *const c_char, ...) -> *mut c_void;

type Sink = Arc<dyn Fn(&str) + Send + Sync>;

/// Destination of formatted log lines, one call per line.
#[derive(Clone)]
pub struct HostLog {
    sink: Sink,
}

impl HostLog {
    pub fn new(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Forwards every line to the server log through `logprintf("%s", line)`.
    pub fn logprintf(logprintf: LogPrintf) -> Self {
        Self::new(move |line| {
            let Ok(line) = CString::new(line.replace('\0', "")) else {
                return;
            };
            unsafe {
                logprintf(c"%s".as_ptr(), line.as_ptr());
            }
        })
    }
}

impl<'a> MakeWriter<'a> for HostLog {
    type Writer = HostLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        HostLogWriter {
            sink: self.sink.clone(),
            pending: Vec::new(),
        }
    }
}

/// Buffers formatted output and hands complete lines to the sink. A trailing
/// partial line is emitted when the writer is dropped.
pub struct HostLogWriter {
    sink: Sink,
    pending: Vec<u8>,
}

impl HostLogWriter {
    fn emit(&self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        (self.sink)(&String::from_utf8_lossy(line));
    }
}

impl io::Write for HostLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(end) = self.pending.iter().position(|&byte| byte == b'\n') {
            let rest = self.pending.split_off(end + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            self.emit(&line[..end]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for HostLogWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line);
        }
    }
}

pub fn init(log: HostLog) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log)
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .without_time()
        .compact()
        .try_init()
        .map_err(|err| io::Error::other(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use super::*;

    fn capture() -> (HostLog, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let log = HostLog::new(move |line| {
            sink.lock().expect("log capture lock").push(line.to_string());
        });
        (log, lines)
    }

    #[test]
    fn writer_splits_output_into_lines() {
        let (log, lines) = capture();
        let mut writer = log.make_writer();
        writer.write_all(b"first\nsec").expect("write");
        writer.write_all(b"ond\r\nthird").expect("write");
        assert_eq!(*lines.lock().expect("lock"), ["first", "second"]);

        drop(writer);
        assert_eq!(*lines.lock().expect("lock"), ["first", "second", "third"]);
    }

    #[test]
    fn empty_lines_are_kept() {
        let (log, lines) = capture();
        let mut writer = log.make_writer();
        writer.write_all(b"\n\nlast\n").expect("write");
        drop(writer);
        assert_eq!(*lines.lock().expect("lock"), ["", "", "last"]);
    }

    #[test]
    fn events_reach_the_sink_through_a_subscriber() {
        let (log, lines) = capture();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log)
            .with_ansi(false)
            .with_target(false)
            .with_level(false)
            .without_time()
            .compact()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("  HelloWorld plugin v1.0.0 is OK");
        });

        let lines = lines.lock().expect("lock");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("HelloWorld plugin v1.0.0 is OK"), "{:?}", lines[0]);
    }
}
