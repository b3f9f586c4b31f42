// Scripted connections and listeners for driving sessions in tests.

use crate::core_network::connection::{
    Connection, DataTransport, PassiveListener, TransferId, TransportError,
};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockState {
    output: Vec<u8>,
    writes: Vec<usize>,
    closed: bool,
}

/// Records everything written to it. Clones share the same state, so a
/// test keeps one clone while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    window: Option<usize>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts at most `window` bytes per write, like a full socket buffer.
    pub fn with_window(window: usize) -> Self {
        Self {
            state: Arc::default(),
            window: Some(window),
        }
    }

    pub fn output(&self) -> Vec<u8> {
        self.state.lock().output.clone()
    }

    /// Drains what was written so far as text.
    pub fn take_output(&self) -> String {
        let mut state = self.state.lock();
        let output = std::mem::take(&mut state.output);
        String::from_utf8_lossy(&output).into_owned()
    }

    pub fn write_sizes(&self) -> Vec<usize> {
        self.state.lock().writes.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Connection for MockConnection {
    fn write(&mut self, data: &[u8]) -> usize {
        let mut state = self.state.lock();
        if state.closed {
            return 0;
        }
        let n = self.window.map_or(data.len(), |w| w.min(data.len()));
        state.output.extend_from_slice(&data[..n]);
        state.writes.push(n);
        n
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }
}

#[derive(Debug, Clone)]
pub struct MockListener {
    port: u16,
    closed: Arc<Mutex<bool>>,
}

impl MockListener {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            closed: Arc::default(),
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

impl PassiveListener for MockListener {
    fn port(&self) -> u16 {
        self.port
    }

    fn close(&mut self) {
        *self.closed.lock() = true;
    }
}

#[derive(Debug, Default)]
struct TransportState {
    listeners: Vec<(TransferId, MockListener)>,
    refuse: bool,
}

/// Hands out mock listeners and remembers them for inspection.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `listen` fail as if the port were taken.
    pub fn refuse_binds(&self) {
        self.state.lock().refuse = true;
    }

    pub fn listeners(&self) -> Vec<(TransferId, MockListener)> {
        self.state.lock().listeners.clone()
    }
}

impl DataTransport for MockTransport {
    fn listen(
        &mut self,
        transfer: TransferId,
        port: u16,
    ) -> Result<Box<dyn PassiveListener>, TransportError> {
        let mut state = self.state.lock();
        if state.refuse {
            return Err(TransportError::Bind {
                port,
                source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
            });
        }
        let listener = MockListener::new(port);
        state.listeners.push((transfer, listener.clone()));
        Ok(Box::new(listener))
    }
}
