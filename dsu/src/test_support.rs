//! Recording fakes for unit tests.

use crate::cancel::CancellationToken;
use crate::listener::{InstallListener, InstallationStep};
use crate::operator::PrivilegedOperator;
use dsu_shared::{DsuError, DsuResult};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingOperator {
    pub calls: Mutex<Vec<String>>,
    pub fail_install: HashSet<String>,
    /// Contents of each staged file at the time it was installed.
    pub installed: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingOperator {
    pub fn failing_install(name: &str) -> Self {
        Self {
            fail_install: HashSet::from([name.to_string()]),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PrivilegedOperator for RecordingOperator {
    fn set_dynamic_partition_property(&self) -> DsuResult<()> {
        self.record("set_property".into());
        Ok(())
    }

    fn force_stop_conflicting_component(&self) -> DsuResult<()> {
        self.record("force_stop".into());
        Ok(())
    }

    fn create_partition(&self, name: &str, size_bytes: u64) -> DsuResult<()> {
        self.record(format!("create:{}:{}", name, size_bytes));
        Ok(())
    }

    fn install_partition_image(&self, staged_file: &Path, name: &str) -> DsuResult<()> {
        self.record(format!("install:{}", name));
        if self.fail_install.contains(name) {
            return Err(DsuError::Internal("write failed".into()));
        }
        let data = std::fs::read(staged_file)?;
        self.installed.lock().unwrap().push((name.to_string(), data));
        Ok(())
    }

    fn enable_dynamic_os(&self) -> DsuResult<()> {
        self.record("enable".into());
        Ok(())
    }

    fn disable_dynamic_os(&self) -> DsuResult<()> {
        self.record("disable".into());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Error(InstallationStep, String),
    Progress(f32, String),
    PartitionCreated(String),
    Step(InstallationStep),
    Success,
}

#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_for(&self, partition: &str) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(f, p) if p == partition => Some(f),
                _ => None,
            })
            .collect()
    }
}

impl InstallListener for RecordingListener {
    fn on_error(&self, step: InstallationStep, error: &DsuError) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Error(step, error.to_string()));
    }

    fn on_progress(&self, fraction: f32, partition: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Progress(fraction, partition.to_string()));
    }

    fn on_partition_created(&self, partition: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::PartitionCreated(partition.to_string()));
    }

    fn on_step_changed(&self, step: InstallationStep) {
        self.events.lock().unwrap().push(Event::Step(step));
    }

    fn on_success(&self) {
        self.events.lock().unwrap().push(Event::Success);
    }
}

/// Reader that cancels `token` once `after` bytes have been handed out.
pub struct CancellingReader<R> {
    pub inner: R,
    pub token: CancellationToken,
    pub after: u64,
    pub read: u64,
}

impl<R: Read> Read for CancellingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        if self.read >= self.after {
            self.token.cancel();
        }
        Ok(n)
    }
}
