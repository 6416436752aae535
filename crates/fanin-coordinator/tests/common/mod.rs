//! Shared helpers for integration tests.

use std::io;
use std::sync::{Arc, Mutex, Once};

use tracing_subscriber::EnvFilter;

/// Install a stderr logger once per test binary. Filtered by `RUST_LOG`.
pub fn init_logging() {
  static INITIALIZED: Once = Once::new();
  INITIALIZED.call_once(|| {
    let subscriber = tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .with_line_number(true)
      .with_test_writer()
      .without_time()
      .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
  });
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// Run `f` with a thread-local subscriber and return what it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
  let buffer = LogBuffer::default();
  let writer = buffer.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_writer(move || writer.clone())
    .with_max_level(tracing::Level::DEBUG)
    .with_ansi(false)
    .without_time()
    .finish();

  let result = tracing::subscriber::with_default(subscriber, f);
  let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
  (result, logs)
}
