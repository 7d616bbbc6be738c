#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration as TokenTtl;
use cmdrelay::auth::TokenRegistry;
use cmdrelay::error::CommandOutcome;
use cmdrelay::exec::{ProcessOutput, ProcessRunner};
use cmdrelay::messaging::{InboundMessage, Messenger, MessagingError};
use cmdrelay::security::Allowlist;
use cmdrelay::{CommandProcessor, Gateway, GatewayOptions, ProcessorSettings};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const OPERATOR: &str = "+15550100";
pub const TEAMMATE: &str = "+15550111";
pub const STRANGER: &str = "+15550999";

/// Helper to create a test git repository
pub fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    for args in [
        vec!["init"],
        vec!["config", "user.name", "Test User"],
        vec!["config", "user.email", "test@example.com"],
    ] {
        Command::new("git")
            .args(&args)
            .current_dir(&repo_path)
            .output()
            .expect("Failed to set up git repo");
    }

    (temp_dir, repo_path)
}

/// Runner that answers from a script instead of spawning
///
/// Replies are matched by command-line prefix; unmatched lines echo back.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: Vec<(String, ProcessOutput)>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, prefix: &str, stdout: &str) -> Self {
        self.replies.push((
            prefix.to_string(),
            ProcessOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            },
        ));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command_line: &str, _cwd: &Path) -> CommandOutcome<ProcessOutput> {
        self.calls.lock().unwrap().push(command_line.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let output = self
            .replies
            .iter()
            .find(|(prefix, _)| command_line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| ProcessOutput {
                stdout: command_line.to_string(),
                ..Default::default()
            });
        Ok(output)
    }
}

/// Messenger that records outbound messages and lets tests inject inbound ones
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    inbound: Mutex<Option<mpsc::Sender<InboundMessage>>>,
    starts: Mutex<usize>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| to == address)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn starts(&self) -> usize {
        *self.starts.lock().unwrap()
    }

    /// Push a message into the monitored stream
    pub async fn deliver(&self, sender: &str, text: &str) {
        let tx = self
            .inbound
            .lock()
            .unwrap()
            .clone()
            .expect("messenger is not monitoring");
        let id = format!("msg_{}", uuid::Uuid::new_v4().simple());
        tx.send(InboundMessage::new(id, sender, text)).await.unwrap();
    }

    /// Poll until `count` messages have been sent
    pub async fn wait_for_sent(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..500 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} messages, got {:?}", count, self.sent());
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, address: &str, text: &str) -> Result<(), MessagingError> {
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), text.to_string()));
        Ok(())
    }

    async fn start_monitoring(&self) -> Result<mpsc::Receiver<InboundMessage>, MessagingError> {
        let (tx, rx) = mpsc::channel(32);
        *self.inbound.lock().unwrap() = Some(tx);
        *self.starts.lock().unwrap() += 1;
        Ok(rx)
    }

    async fn stop_monitoring(&self) {
        self.inbound.lock().unwrap().take();
    }
}

pub fn registry() -> Arc<TokenRegistry> {
    Arc::new(TokenRegistry::new([OPERATOR, TEAMMATE], TokenTtl::hours(24)))
}

pub fn processor(
    runner: Arc<dyn ProcessRunner>,
    messenger: Arc<RecordingMessenger>,
    project_root: &Path,
) -> Arc<CommandProcessor> {
    Arc::new(CommandProcessor::new(
        runner,
        messenger,
        Allowlist::new(["ls", "node"]),
        ProcessorSettings::new(project_root, OPERATOR),
    ))
}

/// Gateway over a scripted runner, with the operator and teammate invited
pub fn gateway(
    runner: Arc<ScriptedRunner>,
    messenger: Arc<RecordingMessenger>,
) -> (Gateway, Arc<TokenRegistry>) {
    let authorizer = registry();
    let gateway = Gateway::new(
        processor(runner, messenger.clone(), Path::new("/srv/project")),
        messenger,
        authorizer.clone(),
        GatewayOptions::new(OPERATOR),
    );
    (gateway, authorizer)
}
