// crates/sandbox-egress/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Scripted transport, resolver, sleeper, store, and log fakes.
// Purpose: Drive the egress pipeline deterministically without a network.
// Dependencies: sandbox-egress, sandbox-egress-core
// ============================================================================

//! ## Overview
//! Fakes for every collaborator the egress runtime injects. Transports replay
//! scripted replies and record what they were asked to send; resolvers
//! replay scripted DNS answers; sleepers record waits instead of blocking.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only helpers may panic on poisoned locks."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use sandbox_egress::CredentialDescriptor;
use sandbox_egress::CredentialKind;
use sandbox_egress::CredentialName;
use sandbox_egress::DestinationPolicy;
use sandbox_egress::EgressLogEvent;
use sandbox_egress::EgressLogSink;
use sandbox_egress::EgressRuntime;
use sandbox_egress::ExecutionLimits;
use sandbox_egress::InMemoryCredentialStore;
use sandbox_egress::RetryPolicy;
use sandbox_egress::TenantId;
use sandbox_egress_core::CredentialStore;
use sandbox_egress_core::CredentialStoreError;
use sandbox_egress_core::HostResolver;
use sandbox_egress_core::OutboundRequest;
use sandbox_egress_core::Sleeper;
use sandbox_egress_core::Transport;
use sandbox_egress_core::TransportError;
use sandbox_egress_core::TransportResponse;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Public address used for scripted DNS answers.
pub const PUBLIC_IP: &str = "93.184.216.34";

// ============================================================================
// SECTION: Transport
// ============================================================================

/// One scripted transport reply.
pub enum Reply {
    /// Response with a fully buffered body.
    Response {
        /// Status code.
        status: u16,
        /// Response headers.
        headers: Vec<(String, String)>,
        /// Body bytes.
        body: Vec<u8>,
    },
    /// Response whose declared length differs from the stream.
    Stream {
        /// Status code.
        status: u16,
        /// Declared content length.
        content_length: Option<u64>,
        /// Bytes the stream yields.
        total: usize,
        /// Read counter shared with the test.
        reads: Arc<AtomicUsize>,
    },
    /// Transport failure.
    Fail(TransportError),
}

impl Reply {
    /// Plain response with a text body.
    pub fn status(status: u16, body: &str) -> Self {
        Self::Response {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    /// Response with headers.
    pub fn with_headers(status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        Self::Response {
            status,
            headers: headers
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
        }
    }
}

/// Transport that replays scripted replies in order.
#[derive(Default)]
pub struct ScriptedTransport {
    /// Pending replies.
    replies: Mutex<VecDeque<Reply>>,
    /// Requests received.
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with the given replies.
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns how many requests were dispatched.
    pub fn dispatch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn dispatch(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front().expect("unscripted dispatch");
        match reply {
            Reply::Response {
                status,
                headers,
                body,
            } => Ok(TransportResponse {
                status,
                headers,
                content_length: Some(u64::try_from(body.len()).unwrap()),
                body: Box::new(Cursor::new(body)),
            }),
            Reply::Stream {
                status,
                content_length,
                total,
                reads,
            } => Ok(TransportResponse {
                status,
                headers: Vec::new(),
                content_length,
                body: Box::new(CountingReader {
                    remaining: total,
                    reads,
                }),
            }),
            Reply::Fail(error) => Err(error),
        }
    }
}

/// Reader that yields filler bytes and counts reads.
pub struct CountingReader {
    /// Bytes left to yield.
    remaining: usize,
    /// Read counter.
    reads: Arc<AtomicUsize>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let n = buf.len().min(self.remaining);
        buf[..n].fill(b'x');
        self.remaining -= n;
        Ok(n)
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolver that replays scripted answers, repeating the last one.
pub struct ScriptedResolver {
    /// Pending answers.
    answers: Mutex<VecDeque<Vec<IpAddr>>>,
    /// Answer repeated once the queue drains.
    last: Mutex<Vec<IpAddr>>,
    /// Lookup counter.
    lookups: AtomicUsize,
}

impl ScriptedResolver {
    /// Resolver that always answers with one address.
    pub fn fixed(ip: &str) -> Arc<Self> {
        Self::sequence(&[ip])
    }

    /// Resolver that answers with each address in turn.
    pub fn sequence(ips: &[&str]) -> Arc<Self> {
        let answers: VecDeque<Vec<IpAddr>> =
            ips.iter().map(|ip| vec![ip.parse::<IpAddr>().unwrap()]).collect();
        Arc::new(Self {
            answers: Mutex::new(answers),
            last: Mutex::new(Vec::new()),
            lookups: AtomicUsize::new(0),
        })
    }

    /// Returns how many lookups were made.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl HostResolver for ScriptedResolver {
    fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.answers.lock().unwrap().pop_front() {
            last.clone_from(&next);
        }
        Ok(last.clone())
    }
}

// ============================================================================
// SECTION: Sleeper + Log Sink
// ============================================================================

/// Sleeper that records waits.
#[derive(Default)]
pub struct RecordingSleeper {
    /// Recorded waits.
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Returns recorded waits.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Log sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingLogSink {
    /// Recorded events.
    events: Mutex<Vec<EgressLogEvent>>,
}

impl RecordingLogSink {
    /// Returns recorded events.
    pub fn events(&self) -> Vec<EgressLogEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EgressLogSink for RecordingLogSink {
    fn record(&self, event: &EgressLogEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Credential Store
// ============================================================================

/// Store that counts lookups.
pub struct CountingStore {
    /// Backing store.
    inner: InMemoryCredentialStore,
    /// Lookup counter.
    lookups: AtomicUsize,
}

impl CountingStore {
    /// Returns how many lookups were made.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl CredentialStore for CountingStore {
    fn lookup(
        &self,
        tenant: &TenantId,
        name: &CredentialName,
    ) -> Result<Option<CredentialDescriptor>, CredentialStoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(tenant, name)
    }

    fn list_names(&self, tenant: &TenantId) -> Result<Vec<CredentialName>, CredentialStoreError> {
        self.inner.list_names(tenant)
    }
}

/// Store with tenant `acme` owning `A` and `B`, and tenant `globex` owning `C`.
pub fn sample_store() -> Arc<CountingStore> {
    let inner = InMemoryCredentialStore::new()
        .with_credential(TenantId::new("acme"), bearer("A", "tok-a"))
        .with_credential(TenantId::new("acme"), bearer("B", "tok-b"))
        .with_credential(TenantId::new("globex"), bearer("C", "tok-c"));
    Arc::new(CountingStore {
        inner,
        lookups: AtomicUsize::new(0),
    })
}

/// Bearer credential descriptor.
pub fn bearer(name: &str, token: &str) -> CredentialDescriptor {
    CredentialDescriptor::new(CredentialName::new(name), CredentialKind::Bearer {
        token: token.into(),
    })
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Runtime wired to fakes.
pub struct Harness {
    /// Runtime under test.
    pub runtime: EgressRuntime,
    /// Scripted transport.
    pub transport: Arc<ScriptedTransport>,
    /// Scripted resolver.
    pub resolver: Arc<ScriptedResolver>,
    /// Recording sleeper.
    pub sleeper: Arc<RecordingSleeper>,
    /// Recording log sink.
    pub log: Arc<RecordingLogSink>,
    /// Counting credential store.
    pub store: Arc<CountingStore>,
}

/// Builds a strict-mode harness with default limits and no retry jitter.
pub fn harness(replies: Vec<Reply>) -> Harness {
    harness_with(replies, ExecutionLimits::default(), ScriptedResolver::fixed(PUBLIC_IP))
}

/// Builds a strict-mode harness with custom limits and resolver.
pub fn harness_with(
    replies: Vec<Reply>,
    limits: ExecutionLimits,
    resolver: Arc<ScriptedResolver>,
) -> Harness {
    let transport = ScriptedTransport::new(replies);
    let sleeper = Arc::new(RecordingSleeper::default());
    let log = Arc::new(RecordingLogSink::default());
    let store = sample_store();
    let runtime = EgressRuntime::builder(transport.clone(), store.clone())
        .limits(limits)
        .destination_policy(DestinationPolicy::strict())
        .host_resolver(resolver.clone())
        .retry_policy(RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        })
        .sleeper(sleeper.clone())
        .log_sink(log.clone())
        .build();
    Harness {
        runtime,
        transport,
        resolver,
        sleeper,
        log,
        store,
    }
}
