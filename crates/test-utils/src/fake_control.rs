use std::sync::{Arc, Mutex};

use devloop::supervisor::control::ControlFuture;
use devloop::supervisor::{PortRelease, ProcessControl, SystemProcessControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    TerminateTree(u32),
    FreePort(u16),
}

/// Records every tree kill and port release.
///
/// Port releases always report [`PortRelease::AlreadyFree`]. Tree kills are
/// only recorded, unless built with [`FakeProcessControl::killing`], which
/// also kills the group for real so spawned test servers do not leak.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessControl {
    events: Arc<Mutex<Vec<ControlEvent>>>,
    real_kill: Option<SystemProcessControl>,
}

impl FakeProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn killing() -> Self {
        Self {
            events: Arc::default(),
            real_kill: Some(SystemProcessControl),
        }
    }

    pub fn events(&self) -> Vec<ControlEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProcessControl for FakeProcessControl {
    fn terminate_tree(&self, pid: u32) -> ControlFuture<'_, ()> {
        self.events
            .lock()
            .unwrap()
            .push(ControlEvent::TerminateTree(pid));
        Box::pin(async move {
            match &self.real_kill {
                Some(real) => real.terminate_tree(pid).await,
                None => Ok(()),
            }
        })
    }

    fn free_port(&self, port: u16) -> ControlFuture<'_, PortRelease> {
        self.events.lock().unwrap().push(ControlEvent::FreePort(port));
        Box::pin(async { Ok(PortRelease::AlreadyFree) })
    }
}
