/// One iteration of the review-service workflow.
use crate::config::WorkflowConfig;
use crate::error::AppError;
use crate::http::client::{ApiClient, ApiRequest};
use crate::http::endpoint::{Credential, Endpoint};
use crate::runtime::executor::Iteration;
use crate::runtime::metrics::{MetricsRegistry, CHECKS, ERRORS, RESPONSE_TIME, SUCCESS};
use crate::workload::context::IterationContext;
use crate::workload::payload::{DeactivatePayload, PullRequestPayload, TeamPayload};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Static bearer tokens presented to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Token for team and pull-request writes.
    pub admin: String,
    /// Token for read-only statistics.
    pub user: String,
}

/// Result of one HTTP call made by an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub endpoint: Endpoint,
    /// `None` when the call failed before a response arrived.
    pub status: Option<u16>,
    pub duration_ms: f64,
    /// Status matched and the latency stayed within its bound.
    pub success: bool,
}

impl CallRecord {
    /// Whether the status alone allows the workflow to continue.
    pub fn status_ok(&self) -> bool {
        self.status == Some(self.endpoint.expected_status())
    }
}

/// Calls made by one iteration, in issue order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationOutcome {
    pub calls: Vec<CallRecord>,
    /// Name of the team created in this iteration, if one was attempted.
    pub team_name: Option<String>,
}

impl IterationOutcome {
    pub fn attempted(&self) -> Vec<Endpoint> {
        self.calls.iter().map(|call| call.endpoint).collect()
    }

    pub fn call(&self, endpoint: Endpoint) -> Option<&CallRecord> {
        self.calls.iter().find(|call| call.endpoint == endpoint)
    }
}

/// Drives the read batch and the probabilistic write chain against a client.
pub struct WorkloadDriver<C: ApiClient> {
    client: Arc<C>,
    config: WorkflowConfig,
    credentials: Credentials,
    metrics: Arc<MetricsRegistry>,
    context: IterationContext,
}

impl<C: ApiClient> WorkloadDriver<C> {
    pub fn new(
        client: Arc<C>,
        config: WorkflowConfig,
        credentials: Credentials,
        metrics: Arc<MetricsRegistry>,
        context: IterationContext,
    ) -> Self {
        Self {
            client,
            config,
            credentials,
            metrics,
            context,
        }
    }

    pub fn context(&self) -> &IterationContext {
        &self.context
    }

    /// Run one iteration and report every call it made.
    ///
    /// The read batch never gates the write chain. Each write only happens
    /// when the previous one returned its expected status.
    pub async fn run_iteration(&self) -> IterationOutcome {
        let mut outcome = IterationOutcome::default();

        let (health, stats) = tokio::join!(
            self.call(Endpoint::Health, Ok(self.request(Endpoint::Health))),
            self.call(Endpoint::Stats, Ok(self.request(Endpoint::Stats))),
        );
        outcome.calls.push(health);
        outcome.calls.push(stats);

        if self.roll(self.config.create_team_probability) {
            self.write_chain(&mut outcome).await;
        }

        pause(self.config.iteration_pause).await;
        outcome
    }

    async fn write_chain(&self, outcome: &mut IterationOutcome) {
        let sequences = &self.context.sequences;
        let clock = &self.context.clock;

        let team = TeamPayload::new(clock.now_millis(), sequences.next_team());
        outcome.team_name = Some(team.team_name.clone());

        let request = self.request(Endpoint::CreateTeam).with_json(&team);
        let created = self.call(Endpoint::CreateTeam, request).await;
        let proceed = created.status_ok();
        outcome.calls.push(created);
        if !proceed {
            return;
        }

        pause(self.config.step_pause).await;
        let author = team
            .author()
            .map(|member| member.user_id.clone())
            .unwrap_or_default();
        let pull_request =
            PullRequestPayload::new(clock.now_millis(), sequences.next_pull_request(), author);
        let request = self
            .request(Endpoint::CreatePullRequest)
            .with_json(&pull_request);
        let opened = self.call(Endpoint::CreatePullRequest, request).await;
        let proceed = opened.status_ok();
        outcome.calls.push(opened);
        if !proceed || !self.roll(self.config.deactivate_probability) {
            return;
        }

        pause(self.config.step_pause).await;
        let request = self
            .request(Endpoint::DeactivateTeam)
            .with_json(&DeactivatePayload {
                team_name: team.team_name,
            });
        outcome
            .calls
            .push(self.call(Endpoint::DeactivateTeam, request).await);
    }

    fn roll(&self, probability: f64) -> bool {
        self.context.random.next_f64() < probability
    }

    fn request(&self, endpoint: Endpoint) -> ApiRequest {
        let request = ApiRequest::new(endpoint);
        match endpoint.credential() {
            Credential::Anonymous => request,
            Credential::User => request.with_bearer(self.credentials.user.as_str()),
            Credential::Admin => request.with_bearer(self.credentials.admin.as_str()),
        }
    }

    async fn call(&self, endpoint: Endpoint, request: Result<ApiRequest, AppError>) -> CallRecord {
        let started = Instant::now();
        let result = match request {
            Ok(request) => self.client.send(&request).await,
            Err(e) => Err(e),
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let status = match result {
            Ok(response) => Some(response.status),
            Err(e) => {
                tracing::debug!(
                    endpoint = endpoint.tag(),
                    request = %endpoint,
                    error = %e,
                    "call failed"
                );
                None
            }
        };

        self.record(endpoint, status, duration_ms)
    }

    /// Record the observations of one call and summarise it.
    fn record(&self, endpoint: Endpoint, status: Option<u16>, duration_ms: f64) -> CallRecord {
        let tag = endpoint.tag();
        let bound_ms = self.config.latency.for_endpoint(endpoint).as_secs_f64() * 1000.0;

        let status_ok = status == Some(endpoint.expected_status());
        let latency_ok = duration_ms < bound_ms;
        let success = status_ok && latency_ok;

        self.metrics.record_http_request(tag, status, duration_ms);
        self.metrics.add_rate(CHECKS, Some(tag), status_ok);
        self.metrics.add_rate(CHECKS, Some(tag), latency_ok);
        self.metrics.add_rate(ERRORS, Some(tag), !success);
        self.metrics.add_rate(SUCCESS, Some(tag), success);
        self.metrics.add_trend(RESPONSE_TIME, Some(tag), duration_ms);

        if !success {
            tracing::debug!(
                endpoint = tag,
                status = ?status,
                duration_ms,
                bound_ms,
                "check failed"
            );
        }

        CallRecord {
            endpoint,
            status,
            duration_ms,
            success,
        }
    }
}

#[async_trait::async_trait]
impl<C: ApiClient + 'static> Iteration for WorkloadDriver<C> {
    async fn run(&self) {
        let outcome = self.run_iteration().await;
        tracing::trace!(calls = ?outcome.attempted(), "iteration finished");
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::ApiResponse;
    use crate::runtime::metrics::{submetric_key, HTTP_REQS, HTTP_REQ_FAILED};
    use crate::workload::context::{FastRandom, FixedClock, ScriptedRandom};
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// Answers every endpoint with its expected status unless overridden.
    #[derive(Default)]
    struct MockClient {
        statuses: HashMap<Endpoint, u16>,
        unreachable: HashSet<Endpoint>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl MockClient {
        fn with_status(mut self, endpoint: Endpoint, status: u16) -> Self {
            self.statuses.insert(endpoint, status);
            self
        }

        fn unreachable(mut self, endpoint: Endpoint) -> Self {
            self.unreachable.insert(endpoint);
            self
        }

        fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl ApiClient for MockClient {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
            self.sent.lock().push(request.clone());
            if self.unreachable.contains(&request.endpoint) {
                return Err(AppError::Http("connection refused".to_string()));
            }
            let status = self
                .statuses
                .get(&request.endpoint)
                .copied()
                .unwrap_or_else(|| request.endpoint.expected_status());
            Ok(ApiResponse { status })
        }

        fn base_url(&self) -> &str {
            "http://mock"
        }
    }

    fn instant_workflow() -> WorkflowConfig {
        WorkflowConfig {
            step_pause: Duration::ZERO,
            iteration_pause: Duration::ZERO,
            ..WorkflowConfig::default()
        }
    }

    fn driver(
        client: MockClient,
        random: ScriptedRandom,
    ) -> (WorkloadDriver<MockClient>, Arc<MetricsRegistry>) {
        let metrics = Arc::new(MetricsRegistry::new());
        let driver = WorkloadDriver::new(
            Arc::new(client),
            instant_workflow(),
            Credentials {
                admin: "admin-secret".into(),
                user: "user-secret".into(),
            },
            metrics.clone(),
            IterationContext::new(Arc::new(random), Arc::new(FixedClock(1_700_000_000_000))),
        );
        (driver, metrics)
    }

    #[tokio::test]
    async fn read_batch_only_when_create_is_not_rolled() {
        let (driver, metrics) = driver(MockClient::default(), ScriptedRandom::never());
        let outcome = driver.run_iteration().await;

        assert_eq!(outcome.attempted(), vec![Endpoint::Health, Endpoint::Stats]);
        assert!(outcome.team_name.is_none());
        assert!(outcome.calls.iter().all(|call| call.success));

        let summary = metrics.snapshot(Duration::from_secs(1));
        assert_eq!(summary.value(HTTP_REQS, "count").ok(), Some(2.0));
        assert_eq!(summary.value(CHECKS, "passes").ok(), Some(4.0));
    }

    #[tokio::test]
    async fn full_chain_when_every_roll_succeeds() {
        let (driver, metrics) = driver(MockClient::default(), ScriptedRandom::always());
        let outcome = driver.run_iteration().await;

        assert_eq!(outcome.attempted(), Endpoint::ALL.to_vec());
        assert_eq!(outcome.team_name.as_deref(), Some("team-1700000000000-1"));

        let summary = metrics.snapshot(Duration::from_secs(1));
        for endpoint in Endpoint::ALL {
            assert_eq!(
                summary
                    .value(&submetric_key(HTTP_REQS, endpoint.tag()), "count")
                    .ok(),
                Some(1.0),
                "{}",
                endpoint
            );
        }
        assert_eq!(summary.value(SUCCESS, "rate").ok(), Some(1.0));
        assert_eq!(summary.value(ERRORS, "rate").ok(), Some(0.0));
    }

    #[tokio::test]
    async fn exactly_one_triple_per_call() {
        let (driver, metrics) = driver(MockClient::default(), ScriptedRandom::always());
        let outcome = driver.run_iteration().await;
        let calls = outcome.calls.len() as f64;

        let summary = metrics.snapshot(Duration::from_secs(1));
        let total = |metric: &str| {
            summary.value(metric, "passes").unwrap_or(0.0)
                + summary.value(metric, "fails").unwrap_or(0.0)
        };
        assert_eq!(total(ERRORS), calls);
        assert_eq!(total(SUCCESS), calls);
        assert_eq!(total(CHECKS), calls * 2.0);
        assert!(summary.value(RESPONSE_TIME, "avg").is_ok());
    }

    #[tokio::test]
    async fn failed_team_creation_stops_the_chain() {
        let client = MockClient::default().with_status(Endpoint::CreateTeam, 409);
        let (driver, metrics) = driver(client, ScriptedRandom::always());
        let outcome = driver.run_iteration().await;

        assert_eq!(
            outcome.attempted(),
            vec![Endpoint::Health, Endpoint::Stats, Endpoint::CreateTeam]
        );
        let created = outcome.call(Endpoint::CreateTeam).expect("create attempted");
        assert_eq!(created.status, Some(409));
        assert!(!created.success);

        let summary = metrics.snapshot(Duration::from_secs(1));
        assert_eq!(summary.value(ERRORS, "passes").ok(), Some(1.0));
        assert_eq!(summary.value(HTTP_REQ_FAILED, "passes").ok(), Some(1.0));
        assert_eq!(driver.context().sequences.pull_requests_created(), 0);
    }

    #[tokio::test]
    async fn failed_pull_request_skips_deactivation() {
        let client = MockClient::default().with_status(Endpoint::CreatePullRequest, 404);
        let (driver, _) = driver(client, ScriptedRandom::always());
        let outcome = driver.run_iteration().await;

        assert!(outcome.call(Endpoint::CreatePullRequest).is_some());
        assert!(outcome.call(Endpoint::DeactivateTeam).is_none());
    }

    #[tokio::test]
    async fn read_failures_do_not_gate_writes() {
        let client = MockClient::default()
            .with_status(Endpoint::Health, 503)
            .unreachable(Endpoint::Stats);
        let (driver, _) = driver(client, ScriptedRandom::always());
        let outcome = driver.run_iteration().await;

        assert_eq!(outcome.attempted().len(), 5);
        assert!(!outcome.call(Endpoint::Health).expect("health called").success);
        assert_eq!(outcome.call(Endpoint::Stats).expect("stats called").status, None);
    }

    #[tokio::test]
    async fn transport_error_is_a_failed_observation() {
        let client = MockClient::default().unreachable(Endpoint::CreateTeam);
        let (driver, metrics) = driver(client, ScriptedRandom::always());
        let outcome = driver.run_iteration().await;

        assert_eq!(outcome.attempted().len(), 3);
        let created = outcome.call(Endpoint::CreateTeam).expect("create attempted");
        assert_eq!(created.status, None);
        assert!(!created.success);

        let summary = metrics.snapshot(Duration::from_secs(1));
        assert_eq!(
            summary
                .value(&submetric_key(HTTP_REQ_FAILED, "create_team"), "rate")
                .ok(),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn credentials_follow_the_endpoint() {
        let (driver, _) = driver(MockClient::default(), ScriptedRandom::always());
        driver.run_iteration().await;

        for request in driver.client.sent() {
            let expected = match request.endpoint {
                Endpoint::Health => None,
                Endpoint::Stats => Some("user-secret"),
                _ => Some("admin-secret"),
            };
            assert_eq!(request.bearer.as_deref(), expected, "{}", request.endpoint);
        }
    }

    #[tokio::test]
    async fn chain_payloads_reference_the_created_team() {
        let (driver, _) = driver(MockClient::default(), ScriptedRandom::always());
        driver.run_iteration().await;

        let sent = driver.client.sent();
        let body = |endpoint: Endpoint| {
            sent.iter()
                .find(|request| request.endpoint == endpoint)
                .and_then(|request| request.body.clone())
                .expect("body sent")
        };
        assert_eq!(body(Endpoint::CreatePullRequest)["author_id"], "user1-1");
        assert_eq!(body(Endpoint::CreatePullRequest)["pull_request_name"], "Feature 1");
        assert_eq!(
            body(Endpoint::DeactivateTeam)["team_name"],
            body(Endpoint::CreateTeam)["team_name"]
        );
    }

    #[tokio::test]
    async fn team_names_are_unique_under_a_frozen_clock() {
        let (driver, _) = driver(MockClient::default(), ScriptedRandom::always());
        let mut names = HashSet::new();
        for _ in 0..50 {
            let outcome = driver.run_iteration().await;
            let name = outcome.team_name.expect("team attempted");
            assert!(names.insert(name.clone()), "duplicate {}", name);
        }
    }

    #[tokio::test]
    async fn slow_deactivation_fails_its_latency_check() {
        let (mut driver, _) = driver(MockClient::default(), ScriptedRandom::always());
        driver.config.latency.deactivate_team = Duration::ZERO;
        let outcome = driver.run_iteration().await;

        let deactivated = outcome.call(Endpoint::DeactivateTeam).expect("deactivate called");
        assert_eq!(deactivated.status, Some(200));
        assert!(!deactivated.success);
    }

    #[tokio::test]
    async fn branch_probabilities_hold_over_many_iterations() {
        let metrics = Arc::new(MetricsRegistry::new());
        let driver = WorkloadDriver::new(
            Arc::new(MockClient::default()),
            instant_workflow(),
            Credentials {
                admin: "a".into(),
                user: "u".into(),
            },
            metrics,
            IterationContext::new(Arc::new(FastRandom), Arc::new(FixedClock(0))),
        );

        let iterations = 2000;
        let mut teams = 0;
        let mut pull_requests = 0;
        let mut deactivations = 0;
        for _ in 0..iterations {
            let outcome = driver.run_iteration().await;
            teams += usize::from(outcome.call(Endpoint::CreateTeam).is_some());
            pull_requests += usize::from(outcome.call(Endpoint::CreatePullRequest).is_some());
            deactivations += usize::from(outcome.call(Endpoint::DeactivateTeam).is_some());
        }

        let create_share = teams as f64 / iterations as f64;
        assert!((0.24..=0.36).contains(&create_share), "p1 = {}", create_share);
        assert_eq!(pull_requests, teams);
        let deactivate_share = deactivations as f64 / pull_requests as f64;
        assert!(
            (0.11..=0.29).contains(&deactivate_share),
            "p2 = {}",
            deactivate_share
        );
    }
}
