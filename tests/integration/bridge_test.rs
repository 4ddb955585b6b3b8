//! Integration tests for the host bridge
//!
//! A host talks JSON lines to a running service over in-memory pipes.

use crate::test_utils::FakePlatform;
use serde_json::Value;
use soundbridge::bridge::{protocol, ServiceOptions, SoundService};
use soundbridge::coordinator::{AudioCoordinator, CoordinatorConfig};
use std::error::Error;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::{broadcast, mpsc};

#[cfg(test)]
mod bridge_integration_tests {
    use super::*;

    struct Host {
        input: DuplexStream,
        output: Lines<BufReader<DuplexStream>>,
    }

    impl Host {
        async fn request(&mut self, json: &str) -> Result<(), Box<dyn Error>> {
            self.input.write_all(json.as_bytes()).await?;
            self.input.write_all(b"\n").await?;
            Ok(())
        }

        /// Reads events until one named `event` arrives.
        async fn expect_event(&mut self, event: &str) -> Result<Value, Box<dyn Error>> {
            loop {
                let line = tokio::time::timeout(Duration::from_secs(2), self.output.next_line())
                    .await??
                    .ok_or("bridge closed its output")?;
                let value: Value = serde_json::from_str(&line)?;
                if value["event"] == event {
                    return Ok(value);
                }
            }
        }
    }

    fn start_bridge(bundle: &TempDir, platform: &FakePlatform) -> (Host, tokio::task::JoinHandle<()>) {
        let (events_tx, events_rx) = broadcast::channel(64);
        let (_notice_tx, notice_rx) = mpsc::unbounded_channel();
        let coordinator = AudioCoordinator::new(
            platform.factory(),
            platform.session(),
            CoordinatorConfig::default(),
            events_tx.clone(),
        );
        let options = ServiceOptions {
            bundle_dir: bundle.path().to_path_buf(),
            resume_tick: Some(Duration::from_millis(10)),
            ..Default::default()
        };
        let (mut service, commands) = SoundService::new(coordinator, notice_rx, events_tx, options);

        let (host_input, bridge_input) = tokio::io::duplex(4096);
        let (bridge_output, host_output) = tokio::io::duplex(16 * 1024);

        let handle = tokio::spawn(async move {
            let service_task = tokio::spawn(async move { service.run().await });
            protocol::serve(BufReader::new(bridge_input), bridge_output, commands, events_rx)
                .await
                .expect("protocol session");
            service_task.await.expect("service task");
        });

        let host = Host { input: host_input, output: BufReader::new(host_output).lines() };
        (host, handle)
    }

    #[tokio::test]
    async fn test_host_session() -> Result<(), Box<dyn Error>> {
        let bundle = TempDir::new()?;
        crate::test_utils::write_silent_wav(&bundle.path().join("ding.wav"), 8000, 800)?;
        let platform = FakePlatform::new();
        let (mut host, handle) = start_bridge(&bundle, &platform);

        host.request(r#"{"method":"setNumberOfLoops","loops":-1}"#).await?;
        host.request(r#"{"method":"playSoundFile","name":"ding","type":"wav"}"#).await?;
        let loaded = host.expect_event("FinishedLoading").await?;
        assert_eq!(loaded["success"], true);
        assert!(loaded["resource"].as_str().unwrap_or_default().ends_with("ding.wav"));

        host.request(r#"{"method":"getInfo"}"#).await?;
        let info = host.expect_event("Info").await?;
        assert_eq!(info["slot"], "alert");
        assert_eq!(info["duration"], 60.0);

        host.request(r#"{"method":"callStateChanged","call":"c1","state":"connected"}"#).await?;
        let interrupted = host.expect_event("AudioInterrupted").await?;
        assert_eq!(interrupted["interrupted"], true);
        assert!(platform.audible().is_empty());

        host.request(r#"{"method":"callStateChanged","call":"c1","state":"ended"}"#).await?;
        let resumed = host.expect_event("AudioInterrupted").await?;
        assert_eq!(resumed["interrupted"], false);
        assert_eq!(platform.audible().len(), 1);

        host.request(r#"{"method":"getState"}"#).await?;
        let state = host.expect_event("State").await?;
        assert_eq!(state["state"], "playing");
        assert_eq!(state["interruptedByCall"], false);

        // Closing the host's input ends the session.
        let Host { input, output: _output } = host;
        drop(input);
        tokio::time::timeout(Duration::from_secs(2), handle).await??;
        assert!(platform.audible().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_requests_get_error_events() -> Result<(), Box<dyn Error>> {
        let bundle = TempDir::new()?;
        let platform = FakePlatform::new();
        let (mut host, handle) = start_bridge(&bundle, &platform);

        host.request("{ definitely not json").await?;
        let error = host.expect_event("Error").await?;
        assert!(error["message"].as_str().unwrap_or_default().contains("Malformed request"));

        host.request(r#"{"method":"playSoundFileWithDelay","name":"ding","type":"wav","delay":1e30}"#).await?;
        let error = host.expect_event("Error").await?;
        assert!(error["message"].as_str().unwrap_or_default().contains("delay"));

        host.request(r#"{"method":"playSoundFile","name":"missing","type":"mp3"}"#).await?;
        let failed = host.expect_event("FinishedLoading").await?;
        assert_eq!(failed["success"], false);
        assert_eq!(failed["resource"], "missing.mp3");

        host.request(r#"{"method":"shutdown"}"#).await?;
        let Host { input, output: _output } = host;
        drop(input);
        tokio::time::timeout(Duration::from_secs(2), handle).await??;
        Ok(())
    }
}
