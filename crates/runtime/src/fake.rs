// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory runtime double for tests.
//!
//! Records every call and serves scripted container states. A container can
//! be marked hang-on-stop to exercise the graceful-then-forced shutdown
//! path, and remove can be scripted to fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::RuntimeError;
use crate::options::RunOptions;
use crate::runtime::{ContainerHandle, ContainerRuntime};
use crate::state::{ContainerState, ContainerStatus};

/// One recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Pull(String),
    Run { image: String, name: String, env: BTreeMap<String, String> },
    Stop { name: String, timeout: Option<Duration> },
    Kill(String),
    Remove(String),
    Inspect(String),
}

struct FakeContainer {
    state: ContainerState,
    hang_on_stop: bool,
}

#[derive(Default)]
struct Inner {
    containers: HashMap<String, FakeContainer>,
    calls: Vec<RuntimeCall>,
    counter: u64,
    fail_next_run: Option<String>,
    failing_removes: HashSet<String>,
}

/// Scriptable [`ContainerRuntime`] double.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a container (e.g. an orphan from a "previous run").
    pub fn register(&self, name: &str, state: ContainerState) -> ContainerHandle {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let id = format!("fid-{}", inner.counter);
        inner
            .containers
            .insert(name.to_string(), FakeContainer { state, hang_on_stop: false });
        ContainerHandle { id, name: name.to_string(), runtime_tag: "fake".to_string() }
    }

    /// Make `stop` on this container block until the caller's timer fires.
    pub fn set_hang_on_stop(&self, name: &str, hang: bool) {
        if let Some(c) = self.inner.lock().containers.get_mut(name) {
            c.hang_on_stop = hang;
        }
    }

    pub fn set_state(&self, name: &str, state: ContainerState) {
        if let Some(c) = self.inner.lock().containers.get_mut(name) {
            c.state = state;
        }
    }

    /// Script the next `run` call to fail with the given detail.
    pub fn fail_next_run(&self, detail: &str) {
        self.inner.lock().fail_next_run = Some(detail.to_string());
    }

    /// Script `remove` on this container to fail.
    pub fn fail_remove(&self, name: &str) {
        self.inner.lock().failing_removes.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.inner.lock().calls.clone()
    }

    pub fn kill_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Kill(n) if n == name))
            .count()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.lock().containers.contains_key(name)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> bool {
        true
    }

    async fn version(&self) -> Result<String, RuntimeError> {
        Ok("fake-1.0".to_string())
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.inner.lock().calls.push(RuntimeCall::Pull(image.to_string()));
        Ok(())
    }

    async fn image_exists(&self, _image: &str) -> Result<bool, RuntimeError> {
        Ok(true)
    }

    async fn load_image(&self, _path: &Path) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn run(&self, options: &RunOptions) -> Result<ContainerHandle, RuntimeError> {
        let mut inner = self.inner.lock();
        if let Some(detail) = inner.fail_next_run.take() {
            return Err(RuntimeError::CommandFailed { op: "run", detail, retriable: false });
        }
        inner.counter += 1;
        let id = format!("fid-{}", inner.counter);
        let name = options.name.clone().unwrap_or_else(|| id.clone());
        inner.calls.push(RuntimeCall::Run {
            image: options.image.clone(),
            name: name.clone(),
            env: options.env.clone(),
        });
        inner.containers.insert(
            name.clone(),
            FakeContainer { state: ContainerState::running(), hang_on_stop: false },
        );
        Ok(ContainerHandle { id, name, runtime_tag: "fake".to_string() })
    }

    async fn stop(&self, handle: &ContainerHandle, timeout: Option<Duration>) -> Result<(), RuntimeError> {
        let hang = {
            let mut inner = self.inner.lock();
            inner.calls.push(RuntimeCall::Stop { name: handle.name.clone(), timeout });
            match inner.containers.get(&handle.name) {
                Some(c) => c.hang_on_stop,
                None => return Err(RuntimeError::NotFound(handle.name.clone())),
            }
        };

        if hang {
            // Simulates an engine that never completes the stop; the caller's
            // bounded timer is expected to win.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        if let Some(c) = self.inner.lock().containers.get_mut(&handle.name) {
            c.state = ContainerState::stopped(0);
        }
        Ok(())
    }

    async fn kill(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RuntimeCall::Kill(handle.name.clone()));
        match inner.containers.get_mut(&handle.name) {
            Some(c) => {
                c.hang_on_stop = false;
                c.state = ContainerState::stopped(137);
                Ok(())
            }
            None => Err(RuntimeError::NotFound(handle.name.clone())),
        }
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RuntimeCall::Remove(handle.name.clone()));
        if inner.failing_removes.contains(&handle.name) {
            return Err(RuntimeError::CommandFailed {
                op: "rm",
                detail: "scripted failure".to_string(),
                retriable: false,
            });
        }
        match inner.containers.remove(&handle.name) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::NotFound(handle.name.clone())),
        }
    }

    async fn inspect(&self, handle: &ContainerHandle) -> Result<ContainerState, RuntimeError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RuntimeCall::Inspect(handle.name.clone()));
        match inner.containers.get(&handle.name) {
            Some(c) => Ok(c.state.clone()),
            None => Err(RuntimeError::NotFound(handle.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_then_inspect_then_remove() {
        let runtime = FakeRuntime::new();
        let handle =
            runtime.run(&RunOptions::new("agent:latest").name("cara-test")).await.unwrap();
        assert_eq!(handle.name, "cara-test");
        assert_eq!(
            runtime.inspect(&handle).await.unwrap().status,
            ContainerStatus::Running
        );
        runtime.remove(&handle).await.unwrap();
        assert!(runtime.inspect(&handle).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn kill_overrides_hang_on_stop() {
        let runtime = FakeRuntime::new();
        let handle = runtime.register("stuck", ContainerState::running());
        runtime.set_hang_on_stop("stuck", true);
        runtime.kill(&handle).await.unwrap();
        let state = runtime.inspect(&handle).await.unwrap();
        assert_eq!(state.status, ContainerStatus::Stopped);
        assert_eq!(state.exit_code, Some(137));
    }

    #[tokio::test]
    async fn scripted_run_failure_fires_once() {
        let runtime = FakeRuntime::new();
        runtime.fail_next_run("image missing");
        assert!(runtime.run(&RunOptions::new("agent:latest")).await.is_err());
        assert!(runtime.run(&RunOptions::new("agent:latest")).await.is_ok());
    }
}
