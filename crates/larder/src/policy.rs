//! The policy engine: classification, stale-while-revalidate, and delivery.

use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::FutureExt;
use parking_lot::RwLock;
use tick::{Clock, Delay, Stopwatch};

use larder_store::{Error, NoStore, Store, StoreKey, StoredEntry};

use crate::{
    flight::{Flight, FlightBoard},
    key::Key,
    pending::PendingGenerates,
    report::{FetchError, FetchOutcome, Fetched, Report},
    rule::{GenerateFn, GenerateTimeout, Generated, Rule, RuleError, Rules},
    runtime::Runtime,
    stats::{Stats, StatsSnapshot},
    telemetry::{self, PolicyActivity, PolicyOperation},
};

/// A construction-time failure.
#[derive(Debug)]
#[non_exhaustive]
pub enum PolicyError {
    /// The rule configuration is invalid.
    Rule(RuleError),
    /// The store rejected the segment name.
    Segment(Error),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(err) => write!(f, "invalid policy rules: {err}"),
            Self::Segment(err) => write!(f, "invalid segment name: {err}"),
        }
    }
}

impl std::error::Error for PolicyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rule(err) => Some(err),
            Self::Segment(err) => Some(err),
        }
    }
}

impl From<RuleError> for PolicyError {
    fn from(err: RuleError) -> Self {
        Self::Rule(err)
    }
}

/// A cache policy over a storage backend.
///
/// A policy owns a compiled rule, a segment within a (possibly shared)
/// store, and the coordination state that gives callers:
///
/// - **expiration** - entries live for `expires_in`, or until the daily
///   `expires_at` wall-clock time;
/// - **staleness** - entries past `stale_in` are served for up to
///   `stale_timeout` while a fresh value is produced in the background;
/// - **single-flight** - concurrent `get`s for one id share a single store
///   read and a single producer run.
///
/// All time flows through the [`Clock`] the policy is constructed with.
///
/// # Examples
///
/// ```
/// use larder::{Policy, Rules};
/// use larder_memory::MemoryStore;
/// use std::time::Duration;
/// use tick::Clock;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let clock = Clock::new_tokio();
/// let store = MemoryStore::<String>::new(clock.clone());
///
/// let policy = Policy::new(
///     Rules::new().expires_in(Duration::from_secs(60)),
///     store,
///     "sessions",
///     clock,
/// )?;
///
/// policy.set("alice", "token".to_string(), None).await?;
/// let fetched = policy.get("alice").await?;
/// assert_eq!(fetched.value.as_deref(), Some("token"));
/// # Ok(())
/// # }
/// ```
pub struct Policy<V, S = NoStore> {
    inner: Arc<Inner<V, S>>,
}

impl<V, S> Clone for Policy<V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, S> fmt::Debug for Policy<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("segment", &self.inner.segment)
            .field("rule", &*self.inner.rule.read())
            .finish_non_exhaustive()
    }
}

struct Inner<V, S> {
    rule: RwLock<Arc<Rule<V>>>,
    store: Option<S>,
    segment: String,
    clock: Clock,
    runtime: Runtime,
    flights: FlightBoard<FetchOutcome<V>>,
    pending_generates: PendingGenerates,
    stats: Stats,
}

impl<V, S> Policy<V, S>
where
    V: Clone + Send + Sync + 'static,
    S: Store<V> + 'static,
{
    /// Creates a policy over a store.
    ///
    /// Compiles the rules and validates the segment name against the store.
    ///
    /// # Errors
    ///
    /// Returns an error when the rules violate a cross-field constraint or
    /// the store rejects the segment name.
    pub fn new(rules: Rules<V>, store: S, segment: impl Into<String>, clock: Clock) -> Result<Self, PolicyError> {
        let segment = segment.into();
        store.validate_segment_name(&segment).map_err(PolicyError::Segment)?;
        let rule = Rule::compile(rules, true)?;

        Ok(Self {
            inner: Arc::new(Inner {
                rule: RwLock::new(Arc::new(rule)),
                store: Some(store),
                segment,
                clock,
                runtime: Runtime::new_tokio(),
                flights: FlightBoard::new(),
                pending_generates: PendingGenerates::new(),
                stats: Stats::new(),
            }),
        })
    }

    /// Compiles and atomically replaces the active rule.
    ///
    /// In-flight requests finish under the rule they started with; new
    /// requests see the replacement.
    ///
    /// # Errors
    ///
    /// Returns an error when the rules violate a cross-field constraint. The
    /// active rule is left untouched in that case.
    pub fn set_rules(&self, rules: Rules<V>) -> Result<(), RuleError> {
        let rule = Rule::compile(rules, self.inner.store.is_some())?;
        *self.inner.rule.write() = Arc::new(rule);
        Ok(())
    }

    /// Retrieves a value, applying the full policy protocol.
    ///
    /// Concurrent calls for the same id coalesce onto one store read; every
    /// caller receives the same completion, in attachment order, together
    /// with a [`Report`] describing the read.
    ///
    /// # Errors
    ///
    /// Returns an error for unmasked store failures, producer failures, and
    /// producer timeouts. When the rule keeps stale entries on producer
    /// errors, the error still carries the stale value.
    ///
    /// # Examples
    ///
    /// ```
    /// use larder::{Policy, Rules};
    /// use larder_memory::MemoryStore;
    /// # async fn example(policy: Policy<String, MemoryStore<String>>) {
    /// match policy.get("user:42").await {
    ///     Ok(fetched) => println!("value: {:?}", fetched.value),
    ///     Err(err) => println!("failed after {:?}: {}", err.report.elapsed, err),
    /// }
    /// # }
    /// ```
    pub async fn get(&self, key: impl Into<Key>) -> Result<Fetched<V>, FetchError<V>> {
        let key = key.into();
        self.inner.stats.incr_gets();

        let (flight, leader) = self.inner.flights.join(key.id());
        if leader {
            let inner = Arc::clone(&self.inner);
            let lead_flight = Arc::clone(&flight);
            self.inner.runtime.spawn(async move {
                inner.lead(key, lead_flight).await;
            });
        }

        flight.wait().await
    }

    /// Writes a value.
    ///
    /// Without an explicit lifetime (or with a zero one), the rule-derived
    /// default for an entry created now is used. Writing through a policy
    /// with no store succeeds and stores nothing.
    ///
    /// # Errors
    ///
    /// Returns the store's error, which is also counted in
    /// [`stats`](Self::stats).
    pub async fn set(&self, key: impl Into<Key>, value: V, ttl: Option<Duration>) -> Result<(), Error> {
        let key = key.into();
        self.inner.set_with_default_ttl(key.id(), value, ttl).await
    }

    /// Removes an entry.
    ///
    /// # Errors
    ///
    /// Fails on an empty id, and otherwise returns the store's error, which
    /// is also counted in [`stats`](Self::stats).
    pub async fn drop_key(&self, key: impl Into<Key>) -> Result<(), Error> {
        let key = key.into();
        if key.id().is_empty() {
            return Err(Error::from_message("invalid key"));
        }
        self.inner.drop_id(key.id()).await
    }

    /// Remaining lifetime of an entry created at `created`, as of now.
    #[must_use]
    pub fn ttl(&self, created: SystemTime) -> Duration {
        let rule = self.inner.rule();
        rule.remaining_ttl(created, self.inner.clock.system_time())
    }

    /// Whether the backing store can currently serve requests.
    ///
    /// Always false for a policy without a store.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.store.as_ref().is_some_and(|store| store.is_ready())
    }

    /// A point-in-time view of the policy's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// The segment this policy addresses in the store.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.inner.segment
    }

    /// The clock this policy runs on.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }
}

impl<V> Policy<V, NoStore>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a policy with no storage backend.
    ///
    /// Reads miss, writes store nothing, and [`is_ready`](Self::is_ready) is
    /// always false; the policy still computes lifetimes and coalesces
    /// producer runs. Stale options are rejected in this mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the rules violate a cross-field constraint.
    pub fn without_store(rules: Rules<V>, clock: Clock) -> Result<Self, PolicyError> {
        let rule = Rule::compile(rules, false)?;

        Ok(Self {
            inner: Arc::new(Inner {
                rule: RwLock::new(Arc::new(rule)),
                store: None,
                segment: String::new(),
                clock,
                runtime: Runtime::new_tokio(),
                flights: FlightBoard::new(),
                pending_generates: PendingGenerates::new(),
                stats: Stats::new(),
            }),
        })
    }
}

impl<V, S> Inner<V, S>
where
    V: Clone + Send + Sync + 'static,
    S: Store<V> + 'static,
{
    fn rule(&self) -> Arc<Rule<V>> {
        Arc::clone(&self.rule.read())
    }

    fn store_key(&self, id: &str) -> StoreKey {
        StoreKey::new(self.segment.clone(), id)
    }

    /// The leader's path: read, classify, and either deliver or enter the
    /// generation protocol.
    async fn lead(self: Arc<Self>, key: Key, flight: Arc<Flight<FetchOutcome<V>>>) {
        let rule = self.rule();
        let watch = Stopwatch::new(&self.clock);

        let read = match &self.store {
            Some(store) => store.get(&self.store_key(key.id())).await,
            None => Ok(None),
        };

        let now = self.clock.system_time();
        let (cached, read_error) = match read {
            Ok(cached) => (cached, None),
            Err(err) => {
                self.stats.incr_errors();
                (None, Some(err))
            }
        };

        let is_stale = cached.as_ref().is_some_and(|entry| rule.is_stale(entry, now));
        if is_stale {
            self.stats.incr_stales();
        }

        let mut report = Report {
            elapsed: watch.elapsed(),
            error: read_error.clone(),
            ..Report::default()
        };
        if let Some(entry) = &cached {
            report.stored = Some(entry.stored());
            report.ttl = Some(entry.ttl());
            report.is_stale = Some(is_stale);
        }

        let id = key.id().to_owned();

        if let Some(error) = read_error {
            if rule.generate_fn.is_none() || !rule.generate_on_read_error {
                let outcome = Err(FetchError {
                    error,
                    value: None,
                    entry: None,
                    report,
                });
                self.respond(&id, &flight, outcome, false, PolicyActivity::Error);
                return;
            }
            // The read error is masked: regenerate as if the read missed.
        } else if let Some(entry) = &cached {
            if !is_stale {
                let outcome = Ok(Fetched {
                    value: Some(entry.item().clone()),
                    entry: cached.clone(),
                    report,
                });
                self.respond(&id, &flight, outcome, true, PolicyActivity::Hit);
                return;
            }
        } else if rule.generate_fn.is_none() {
            let outcome = Ok(Fetched {
                value: None,
                entry: None,
                report,
            });
            self.respond(&id, &flight, outcome, false, PolicyActivity::Miss);
            return;
        }

        let Some(producer) = rule.generate_fn.clone() else {
            // Unreachable: every path that falls through has a producer.
            return;
        };

        self.generate(key, rule, producer, flight, cached, is_stale, report);
    }

    /// The stale-while-revalidate protocol for a miss or a stale hit.
    fn generate(
        self: Arc<Self>,
        key: Key,
        rule: Arc<Rule<V>>,
        producer: GenerateFn<V>,
        flight: Arc<Flight<FetchOutcome<V>>>,
        cached: Option<StoredEntry<V>>,
        is_stale: bool,
        report: Report,
    ) {
        let id = key.id().to_owned();

        // Fallback timer. A stale hit is served as-is once `stale_timeout`
        // elapses, provided the entry would still be alive by then; a miss
        // fails with a timeout error after `generate_timeout`. Either way the
        // producer keeps running and writes back for future reads.
        if is_stale {
            if let (Some(entry), Some(stale_timeout)) = (&cached, rule.stale_timeout) {
                if entry.ttl() > stale_timeout {
                    let outcome = Ok(Fetched {
                        value: Some(entry.item().clone()),
                        entry: Some(entry.clone()),
                        report: report.clone(),
                    });
                    self.arm_fallback(&id, &flight, stale_timeout, outcome, true, PolicyActivity::StaleServed);
                }
            }
        } else if let Some(GenerateTimeout::After(timeout)) = rule.generate_timeout {
            let outcome = Err(FetchError {
                error: Error::from_message("server timeout"),
                value: None,
                entry: None,
                report: report.clone(),
            });
            self.arm_fallback(&id, &flight, timeout, outcome, false, PolicyActivity::Timeout);
        }

        // Single-flight of the producer itself. Within the pending window a
        // repeat run is suppressed; the waiters above are covered by their
        // fallback timer or by the prior run's completion.
        let guarded = !rule.pending_generate_timeout.is_zero();
        if guarded {
            if !self.pending_generates.try_begin(&id) {
                return;
            }

            let window = rule.pending_generate_timeout;
            let unmarker = Arc::clone(&self);
            let unmark_id = id.clone();
            self.runtime.spawn(async move {
                Delay::new(&unmarker.clock, window).await;
                unmarker.pending_generates.end(&unmark_id);
            });
        }

        self.stats.incr_generates();

        let task = Arc::clone(&self);
        self.runtime.spawn(async move {
            // A producer that panics when called (or whose future panics) is
            // a producer error, not a dead flight.
            let result = match std::panic::catch_unwind(AssertUnwindSafe(|| producer(key))) {
                Ok(work) => AssertUnwindSafe(work)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(Error::from_message("generate function panicked"))),
                Err(_) => Err(Error::from_message("generate function panicked")),
            };

            task.finish_generate(&id, &rule, cached, report, result, guarded).await;
        });
    }

    /// The producer's completion: write back or drop, then deliver.
    async fn finish_generate(
        &self,
        id: &str,
        rule: &Rule<V>,
        cached: Option<StoredEntry<V>>,
        report: Report,
        result: Result<Generated<V>, Error>,
        guarded: bool,
    ) {
        if guarded {
            self.pending_generates.end(id);
        }

        match result {
            Ok(generated) => {
                let (value, ttl_override) = generated.into_parts();
                if ttl_override.is_some_and(|ttl| ttl.is_zero()) {
                    // The producer forbade caching this value.
                    let _ = self.drop_id(id).await;
                    self.deliver_generated(id, None, Some(value), cached, rule.drop_on_error, report);
                } else {
                    let write = self.set_with_default_ttl(id, value.clone(), ttl_override).await;
                    let error = match write {
                        Err(err) if !rule.generate_ignore_write_error => Some(err),
                        _ => None,
                    };
                    self.deliver_generated(id, error, Some(value), cached, rule.drop_on_error, report);
                }
            }
            Err(error) => {
                self.stats.incr_errors();
                if rule.drop_on_error {
                    let _ = self.drop_id(id).await;
                }
                self.deliver_generated(id, Some(error), None, cached, rule.drop_on_error, report);
            }
        }
    }

    /// Delivers a producer outcome to whatever flight is current for the id.
    ///
    /// When the fallback timer has already answered the waiters this is a
    /// no-op for delivery - the write-back above still happened.
    fn deliver_generated(
        &self,
        id: &str,
        error: Option<Error>,
        value: Option<V>,
        cached: Option<StoredEntry<V>>,
        drop_on_error: bool,
        report: Report,
    ) {
        let observed_entry = cached.is_some();
        let (outcome, activity) = match error {
            None => (
                Ok(Fetched {
                    value,
                    entry: None,
                    report,
                }),
                PolicyActivity::Generated,
            ),
            Some(error) => {
                let outcome = match (cached, drop_on_error) {
                    // The stale entry keeps serving; the error rides along.
                    (Some(entry), false) => Err(FetchError {
                        error,
                        value: Some(entry.item().clone()),
                        entry: Some(entry),
                        report,
                    }),
                    _ => Err(FetchError {
                        error,
                        value,
                        entry: None,
                        report,
                    }),
                };
                (outcome, PolicyActivity::Error)
            }
        };

        if let Some(flight) = self.flights.current(id) {
            self.respond(id, &flight, outcome, observed_entry, activity);
        }
    }

    /// Races a timer against the producer for the current waiters.
    fn arm_fallback(
        self: &Arc<Self>,
        id: &str,
        flight: &Arc<Flight<FetchOutcome<V>>>,
        delay: Duration,
        outcome: FetchOutcome<V>,
        observed_entry: bool,
        activity: PolicyActivity,
    ) {
        let inner = Arc::clone(self);
        let id = id.to_owned();
        let flight = Arc::clone(flight);
        self.runtime.spawn(async move {
            Delay::new(&inner.clock, delay).await;
            inner.respond(&id, &flight, outcome, observed_entry, activity);
        });
    }

    /// Resolves a flight exactly once and retires it from the board.
    fn respond(
        &self,
        id: &str,
        flight: &Arc<Flight<FetchOutcome<V>>>,
        outcome: FetchOutcome<V>,
        observed_entry: bool,
        activity: PolicyActivity,
    ) {
        // Retire first so a caller arriving mid-resolution starts a fresh
        // flight instead of attaching to a finished one.
        self.flights.retire(id, flight);

        let elapsed = match &outcome {
            Ok(fetched) => fetched.report.elapsed,
            Err(err) => err.report.elapsed,
        };

        if flight.resolve(outcome) {
            if observed_entry {
                self.stats.add_hits(flight.waiters() as u64);
            }
            telemetry::record(&self.segment, PolicyOperation::Get, activity, elapsed);
        }
    }

    async fn set_with_default_ttl(&self, id: &str, value: V, ttl: Option<Duration>) -> Result<(), Error> {
        self.stats.incr_sets();
        let Some(store) = &self.store else {
            return Ok(());
        };

        let ttl = match ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => {
                let now = self.clock.system_time();
                self.rule().remaining_ttl(now, now)
            }
        };

        let watch = Stopwatch::new(&self.clock);
        let result = store.set(&self.store_key(id), value, ttl).await;
        match &result {
            Ok(()) => telemetry::record(&self.segment, PolicyOperation::Set, PolicyActivity::Inserted, watch.elapsed()),
            Err(_) => {
                self.stats.incr_errors();
                telemetry::record(&self.segment, PolicyOperation::Set, PolicyActivity::Error, watch.elapsed());
            }
        }
        result
    }

    async fn drop_id(&self, id: &str) -> Result<(), Error> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let watch = Stopwatch::new(&self.clock);
        let result = store.drop_entry(&self.store_key(id)).await;
        match &result {
            Ok(()) => telemetry::record(&self.segment, PolicyOperation::Drop, PolicyActivity::Dropped, watch.elapsed()),
            Err(_) => {
                self.stats.incr_errors();
                telemetry::record(&self.segment, PolicyOperation::Drop, PolicyActivity::Error, watch.elapsed());
            }
        }
        result
    }
}
