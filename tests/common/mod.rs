//! Shared fixtures for integration tests

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use upcast::models::{Channel, Credentials};
use upcast::publish::{MediaPublisher, PublishError, PublishRequest};
use upcast::scheduler::{ChannelScheduler, SchedulerState, UploadPolicy};

/// Publisher recording successful calls, with scripted failures per file name
#[derive(Default)]
pub struct ScriptedPublisher {
    published: Mutex<Vec<String>>,
    quota_on: Mutex<Vec<String>>,
    fail_on: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedPublisher {
    pub fn quota_on(self, name: &str) -> Self {
        self.quota_on.lock().unwrap().push(name.to_string());
        self
    }

    pub fn fail_on(self, name: &str) -> Self {
        self.fail_on.lock().unwrap().push(name.to_string());
        self
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaPublisher for ScriptedPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<(), PublishError> {
        let name = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.quota_on.lock().unwrap().contains(&name) {
            return Err(PublishError::QuotaExceeded);
        }
        if self.fail_on.lock().unwrap().contains(&name) {
            return Err(PublishError::transport("scripted outage"));
        }
        self.published.lock().unwrap().push(name);
        Ok(())
    }
}

/// Publisher whose calls never return, freezing publish tasks mid-flight
pub struct StalledPublisher;

#[async_trait]
impl MediaPublisher for StalledPublisher {
    async fn publish(&self, _request: &PublishRequest) -> Result<(), PublishError> {
        futures::future::pending().await
    }
}

/// Generator recording every top-up request it receives
#[derive(Default)]
pub struct CountingGenerator {
    calls: Mutex<Vec<(String, usize)>>,
}

#[allow(dead_code)]
impl CountingGenerator {
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl upcast::content::ContentGenerator for CountingGenerator {
    async fn generate(&self, channel: &str, count: usize) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push((channel.to_string(), count));
        Ok(())
    }
}

/// Build an initialized scheduler for one channel under a temp root
pub async fn build_scheduler(
    root: &Path,
    name: &str,
    policy: UploadPolicy,
    state: Arc<SchedulerState>,
    publisher: Arc<dyn MediaPublisher>,
) -> Arc<ChannelScheduler> {
    let channel = Channel::new(root, name, Credentials::default());
    let scheduler = Arc::new(ChannelScheduler::new(channel, policy, state, publisher));
    scheduler.init().await.unwrap();
    scheduler
}

/// Place one artifact file into a channel's staging directory
pub async fn stage(scheduler: &ChannelScheduler, name: &str) {
    tokio::fs::write(scheduler.channel().pending_dir.join(name), b"media")
        .await
        .unwrap();
}

/// Poll a condition until it holds, panicking after ~5 seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}
