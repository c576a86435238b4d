//! Waiting for an integration to reach a target state.
//!
//! Cloud integrations enable and disable asynchronously. After changing the
//! `enabled` property the provider polls the integration until its derived
//! state is one of the target states, failing on any state that is neither
//! pending nor target, or when the timeout elapses.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::{Integration, SignalFxClient};
use crate::error::ProviderError;

/// Integration is enabled.
pub const STATE_ENABLED: &str = "ENABLED";
/// Integration is being enabled.
pub const STATE_ENABLING: &str = "ENABLING";
/// Integration is disabled.
pub const STATE_DISABLED: &str = "DISABLED";
/// Integration is being disabled.
pub const STATE_DISABLING: &str = "DISABLING";
/// Pending sync jobs are being cancelled.
pub const STATE_CANCELLING: &str = "CANCELLING";
/// Cancelling pending sync jobs failed.
pub const STATE_CANCELLATION_FAILED: &str = "CANCELLATION_FAILED";

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default time to wait for a target state.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// States to keep polling through and states that end the wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeConf {
    /// Transitional states.
    pub pending: Vec<&'static str>,
    /// Desired states.
    pub target: Vec<&'static str>,
}

impl StateChangeConf {
    /// Pending and target states for setting `property` to `desired`.
    pub fn for_property(property: &str, desired: &Value) -> Result<Self, ProviderError> {
        match (property, desired) {
            ("enabled", Value::Bool(true)) => Ok(Self {
                pending: vec![STATE_DISABLED, STATE_ENABLING],
                target: vec![STATE_ENABLED],
            }),
            ("enabled", Value::Bool(false)) => Ok(Self {
                pending: vec![STATE_ENABLED, STATE_DISABLING, STATE_CANCELLING],
                target: vec![STATE_DISABLED],
            }),
            ("enabled", other) => Err(ProviderError::Validation(format!(
                "enabled must be a boolean, got {}",
                other
            ))),
            (other, _) => Err(ProviderError::Validation(format!(
                "cannot wait on integration property {:?}",
                other
            ))),
        }
    }

    fn is_target(&self, state: &str) -> bool {
        self.target.contains(&state)
    }

    fn is_pending(&self, state: &str) -> bool {
        self.pending.contains(&state)
    }
}

/// Polling behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Interval between polls.
    pub poll_interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
    /// Treat `CANCELLATION_FAILED` as `DISABLED`.
    pub ignore_failures: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            ignore_failures: false,
        }
    }
}

impl WaitOptions {
    /// Set `ignore_failures`.
    pub fn ignoring_failures(mut self, ignore: bool) -> Self {
        self.ignore_failures = ignore;
        self
    }
}

/// The state string an integration is compared on.
///
/// The reported `status` wins when present; otherwise the boolean `property`
/// maps to `ENABLED`/`DISABLED`.
pub fn derive_state(integration: &Integration, property: &str, ignore_failures: bool) -> String {
    let state = match integration.status() {
        Some(status) => status.to_string(),
        None => match integration.property(property) {
            Some(Value::Bool(true)) => STATE_ENABLED.to_string(),
            _ => STATE_DISABLED.to_string(),
        },
    };
    if ignore_failures && state == STATE_CANCELLATION_FAILED {
        return STATE_DISABLED.to_string();
    }
    state
}

/// Poll integration `id` until `property` reaches `desired`.
pub async fn wait_for_integration_state(
    client: &SignalFxClient,
    id: &str,
    property: &str,
    desired: &Value,
    options: WaitOptions,
) -> Result<Integration, ProviderError> {
    let conf = StateChangeConf::for_property(property, desired)?;
    info!(integration = %id, property, desired = %desired, "Waiting for integration state");
    wait_for_state(&conf, property, options, move || client.get_integration(id)).await
}

/// Poll `fetch` until the derived state is a target state.
pub async fn wait_for_state<F, Fut>(
    conf: &StateChangeConf,
    property: &str,
    options: WaitOptions,
    mut fetch: F,
) -> Result<Integration, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Integration, ProviderError>>,
{
    let deadline = Instant::now() + options.timeout;
    let mut polls = 0u32;

    loop {
        let integration = fetch().await?;
        polls += 1;
        let state = derive_state(&integration, property, options.ignore_failures);
        debug!(state = %state, polls, "Polled integration");

        if conf.is_target(&state) {
            return Ok(integration);
        }
        if !conf.is_pending(&state) {
            return Err(ProviderError::FailedPrecondition(format!(
                "unexpected integration state {} (waiting for {})",
                state,
                conf.target.join(", ")
            )));
        }
        if Instant::now() + options.poll_interval > deadline {
            return Err(ProviderError::DeadlineExceeded(format!(
                "integration still {} after {:?} (waiting for {})",
                state,
                options.timeout,
                conf.target.join(", ")
            )));
        }

        tokio::time::sleep(options.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn integration(enabled: bool, status: Option<&str>) -> Integration {
        let mut i = Integration::new("AWSCloudWatch", "prod", enabled);
        if let Some(status) = status {
            i = i.with_setting("status", json!(status));
        }
        i
    }

    fn fast() -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(500),
            ignore_failures: false,
        }
    }

    /// Replays a script of states, repeating the last one forever.
    fn scripted(
        states: Vec<Integration>,
    ) -> (
        Arc<Mutex<u32>>,
        impl FnMut() -> std::future::Ready<Result<Integration, ProviderError>>,
    ) {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut queue: VecDeque<_> = states.into();
        let fetch = move || {
            *counter.lock().unwrap() += 1;
            let next = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            };
            std::future::ready(Ok(next))
        };
        (calls, fetch)
    }

    #[test]
    fn state_sets() {
        let enable = StateChangeConf::for_property("enabled", &json!(true)).unwrap();
        assert_eq!(enable.pending, vec!["DISABLED", "ENABLING"]);
        assert_eq!(enable.target, vec!["ENABLED"]);

        let disable = StateChangeConf::for_property("enabled", &json!(false)).unwrap();
        assert_eq!(disable.pending, vec!["ENABLED", "DISABLING", "CANCELLING"]);
        assert_eq!(disable.target, vec!["DISABLED"]);

        assert!(matches!(
            StateChangeConf::for_property("pollRate", &json!(300)),
            Err(ProviderError::Validation(_))
        ));
        assert!(matches!(
            StateChangeConf::for_property("enabled", &json!("yes")),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn derived_state() {
        assert_eq!(derive_state(&integration(true, None), "enabled", false), "ENABLED");
        assert_eq!(derive_state(&integration(false, None), "enabled", false), "DISABLED");
        assert_eq!(
            derive_state(&integration(true, Some("ENABLING")), "enabled", false),
            "ENABLING"
        );
        assert_eq!(
            derive_state(&integration(false, Some("CANCELLATION_FAILED")), "enabled", false),
            "CANCELLATION_FAILED"
        );
        assert_eq!(
            derive_state(&integration(false, Some("CANCELLATION_FAILED")), "enabled", true),
            "DISABLED"
        );
    }

    #[tokio::test]
    async fn polls_through_pending_states() {
        let conf = StateChangeConf::for_property("enabled", &json!(true)).unwrap();
        let (calls, fetch) = scripted(vec![
            integration(false, Some("DISABLED")),
            integration(true, Some("ENABLING")),
            integration(true, Some("ENABLED")),
        ]);

        let result = wait_for_state(&conf, "enabled", fast(), fetch).await.unwrap();
        assert_eq!(result.status(), Some("ENABLED"));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn target_on_first_poll_returns_immediately() {
        let conf = StateChangeConf::for_property("enabled", &json!(false)).unwrap();
        let (calls, fetch) = scripted(vec![integration(false, None)]);

        wait_for_state(&conf, "enabled", fast(), fetch).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cancellation_failure() {
        let conf = StateChangeConf::for_property("enabled", &json!(false)).unwrap();

        let (_, fetch) = scripted(vec![
            integration(false, Some("CANCELLING")),
            integration(false, Some("CANCELLATION_FAILED")),
        ]);
        let err = wait_for_state(&conf, "enabled", fast(), fetch).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));

        let (_, fetch) = scripted(vec![
            integration(false, Some("CANCELLING")),
            integration(false, Some("CANCELLATION_FAILED")),
        ]);
        let result = wait_for_state(&conf, "enabled", fast().ignoring_failures(true), fetch)
            .await
            .unwrap();
        assert_eq!(result.status(), Some("CANCELLATION_FAILED"));
    }

    #[tokio::test]
    async fn times_out_while_pending() {
        let conf = StateChangeConf::for_property("enabled", &json!(true)).unwrap();
        let (calls, fetch) = scripted(vec![integration(true, Some("ENABLING"))]);
        let options = WaitOptions {
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(35),
            ignore_failures: false,
        };

        let err = wait_for_state(&conf, "enabled", options, fetch).await.unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
        assert!(*calls.lock().unwrap() >= 2);
    }

    #[test]
    fn fetch_errors_propagate() {
        let conf = StateChangeConf::for_property("enabled", &json!(true)).unwrap();
        let result = tokio_test::block_on(wait_for_state(&conf, "enabled", fast(), || {
            std::future::ready(Err(ProviderError::NotFound("I1".to_string())))
        }));
        let err = tokio_test::assert_err!(result);
        assert!(err.is_not_found());
    }

    #[test]
    fn default_options() {
        let options = WaitOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(5));
        assert_eq!(options.timeout, Duration::from_secs(300));
        assert!(!options.ignore_failures);
    }

    #[tokio::test]
    async fn waits_against_the_api() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/integration/I1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "I1", "name": "prod", "type": "GCP", "enabled": true, "status": "ENABLING"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/integration/I1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "I1", "name": "prod", "type": "GCP", "enabled": true, "status": "ENABLED"
            })))
            .mount(&server)
            .await;

        let client = SignalFxClient::new(
            &server.uri(),
            "tok",
            Duration::from_secs(5),
            crate::client::RetryPolicy::none(),
        )
        .unwrap();
        let result = wait_for_integration_state(&client, "I1", "enabled", &json!(true), fast())
            .await
            .unwrap();
        assert_eq!(result.id.as_deref(), Some("I1"));
    }
}
