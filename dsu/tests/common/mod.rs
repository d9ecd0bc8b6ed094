//! Fakes for driving the installer end to end.

#![allow(dead_code)]

use dsu::operator::{ByteStream, PrivilegedOperator, StreamProvider, SystemProperties};
use dsu::{
    CancellationToken, Collaborators, DsuError, DsuResult, InstallListener, InstallState,
    InstallationSource, InstallationStep, Installer, InstallerOptions,
};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeOperator {
    pub calls: Mutex<Vec<String>>,
    pub fail_create: HashSet<String>,
    pub fail_install: HashSet<String>,
    pub fail_enable: bool,
    /// Cancel this token right after the named partition is written.
    pub cancel_after_install: Option<(String, CancellationToken)>,
    /// Bytes received per installed partition.
    pub installed: Mutex<Vec<(String, usize)>>,
}

impl FakeOperator {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PrivilegedOperator for FakeOperator {
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
        if self.fail_create.contains(name) {
            return Err(DsuError::Internal("no space left".into()));
        }
        Ok(())
    }

    fn install_partition_image(&self, staged_file: &Path, name: &str) -> DsuResult<()> {
        self.record(format!("install:{}", name));
        if self.fail_install.contains(name) {
            return Err(DsuError::Internal("write failed".into()));
        }
        let len = std::fs::metadata(staged_file)?.len() as usize;
        self.installed.lock().unwrap().push((name.to_string(), len));
        if let Some((partition, token)) = &self.cancel_after_install
            && partition == name
        {
            token.cancel();
        }
        Ok(())
    }

    fn enable_dynamic_os(&self) -> DsuResult<()> {
        self.record("enable".into());
        if self.fail_enable {
            return Err(DsuError::Internal("enable failed".into()));
        }
        Ok(())
    }

    fn disable_dynamic_os(&self) -> DsuResult<()> {
        self.record("disable".into());
        Ok(())
    }
}

pub struct FakeProperties {
    pub running: bool,
}

impl SystemProperties for FakeProperties {
    fn is_dynamic_os_image_running(&self) -> DsuResult<bool> {
        Ok(self.running)
    }
}

/// Reader that cancels its token after handing out `after` bytes.
struct CancelAfter {
    inner: Cursor<Vec<u8>>,
    token: CancellationToken,
    after: u64,
    read: u64,
}

impl Read for CancelAfter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        if self.read >= self.after {
            self.token.cancel();
        }
        Ok(n)
    }
}

#[derive(Default)]
pub struct MemoryStreams {
    data: HashMap<String, Vec<u8>>,
    cancel_after: HashMap<String, (u64, CancellationToken)>,
    pub opened: Mutex<Vec<String>>,
}

impl MemoryStreams {
    pub fn with(mut self, locator: &str, data: Vec<u8>) -> Self {
        self.data.insert(locator.to_string(), data);
        self
    }

    pub fn cancelling(mut self, locator: &str, after: u64, token: &CancellationToken) -> Self {
        self.cancel_after
            .insert(locator.to_string(), (after, token.clone()));
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl StreamProvider for MemoryStreams {
    fn open_stream(&self, locator: &str) -> DsuResult<ByteStream> {
        self.opened.lock().unwrap().push(locator.to_string());
        let data = self
            .data
            .get(locator)
            .cloned()
            .ok_or_else(|| DsuError::Stream(format!("unknown locator {}", locator)))?;
        if let Some((after, token)) = self.cancel_after.get(locator) {
            return Ok(Box::new(CancelAfter {
                inner: Cursor::new(data),
                token: token.clone(),
                after: *after,
                read: 0,
            }));
        }
        Ok(Box::new(Cursor::new(data)))
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
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(InstallationStep, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(step, msg) => Some((step, msg)),
                _ => None,
            })
            .collect()
    }

    pub fn successes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Success))
            .count()
    }

    pub fn created(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::PartitionCreated(p) => Some(p),
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

pub fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Incompressible bytes, so zip offsets track entry data offsets.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

pub const USERDATA_SIZE: u64 = 2 * 1024 * 1024;

/// One installer run against fakes, with a private staging area.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub operator: Arc<FakeOperator>,
    pub streams: Arc<MemoryStreams>,
    pub listener: Arc<RecordingListener>,
    pub running: bool,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(operator: FakeOperator, streams: MemoryStreams, cancel: CancellationToken) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            operator: Arc::new(operator),
            streams: Arc::new(streams),
            listener: Arc::new(RecordingListener::default()),
            running: false,
            cancel,
        }
    }

    pub fn options(&self) -> InstallerOptions {
        InstallerOptions {
            userdata_size: USERDATA_SIZE,
            staging_dir: self.dir.path().join("staging"),
            installation_dir: self.dir.path().join("gsi").join("dsu"),
            ..Default::default()
        }
    }

    pub fn staged_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.dir.path().join("staging")) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn run(&self, source: InstallationSource) -> InstallState {
        let collaborators = Collaborators {
            operator: self.operator.clone(),
            streams: self.streams.clone(),
            properties: Arc::new(FakeProperties {
                running: self.running,
            }),
            listener: self.listener.clone(),
        };
        let installer =
            Installer::new(&self.options(), source, self.cancel.clone(), collaborators).unwrap();
        let state = installer.subscribe_state();
        assert_eq!(*state.borrow(), InstallState::Idle);
        installer.run().await;
        let final_state = *state.borrow();
        final_state
    }
}
