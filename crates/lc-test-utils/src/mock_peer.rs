//! Scripted peer connector.

use std::sync::Mutex;

use async_trait::async_trait;

use live_controller::media::{
    IceConnectionState, MediaStream, PeerConnector, PeerError, PeerLink, PeerLinkDriver,
};

/// What the connector does on the next `connect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectScript {
    /// Report connectivity immediately.
    Connect,
    /// Return a link that never leaves `New` (the driver is retained so the
    /// channel stays open and callers time out or are driven manually).
    Stall,
    /// Report `Failed` immediately.
    FailNegotiation,
    /// Refuse to produce a link at all.
    RefuseConnect,
}

/// Mock peer connector for join-sequence testing.
pub struct ScriptedConnector {
    script: Mutex<ConnectScript>,
    drivers: Mutex<Vec<PeerLinkDriver>>,
}

impl ScriptedConnector {
    pub fn new(script: ConnectScript) -> Self {
        Self {
            script: Mutex::new(script),
            drivers: Mutex::new(Vec::new()),
        }
    }

    pub fn connecting() -> Self {
        Self::new(ConnectScript::Connect)
    }

    pub fn set_script(&self, script: ConnectScript) {
        *self.script.lock().unwrap() = script;
    }

    /// How many links have been handed out.
    pub fn connects(&self) -> usize {
        self.drivers.lock().unwrap().len()
    }

    /// Drive every retained link to `state` (for `Stall` scripts).
    pub fn drive_all(&self, state: IceConnectionState) {
        for driver in self.drivers.lock().unwrap().iter() {
            driver.set_state(state);
        }
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::connecting()
    }
}

#[async_trait]
impl PeerConnector for ScriptedConnector {
    async fn connect(&self, _stream: &MediaStream) -> Result<PeerLink, PeerError> {
        let script = *self.script.lock().unwrap();
        if script == ConnectScript::RefuseConnect {
            return Err(PeerError::SignalingClosed);
        }
        let (driver, link) = PeerLink::channel();
        match script {
            ConnectScript::Connect => {
                driver.set_state(IceConnectionState::Checking);
                driver.set_state(IceConnectionState::Connected);
            }
            ConnectScript::FailNegotiation => {
                driver.set_state(IceConnectionState::Checking);
                driver.set_state(IceConnectionState::Failed);
            }
            ConnectScript::Stall | ConnectScript::RefuseConnect => {}
        }
        self.drivers.lock().unwrap().push(driver);
        Ok(link)
    }
}
