//! Rule configuration and compilation.
//!
//! A [`Rules`] value is the caller-facing configuration of a policy. Before
//! use it is compiled into an immutable `Rule`: cross-field constraints are
//! checked, the `expires_at` clock string is parsed, and defaults are
//! materialized. Compilation is where every configuration mistake surfaces,
//! so the running engine never has to second-guess its own rule.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use larder_store::{Error, StoredEntry};

use crate::{key::Key, ttl};

/// Upper bound on a numeric `stale_in`: one millisecond short of a day.
const STALE_IN_MAX: Duration = Duration::from_millis(86_399_999);

/// A value produced by a generate function.
///
/// Carries the fresh value and an optional lifetime override. Without an
/// override the policy writes the value back with its rule-derived lifetime.
/// An explicit zero lifetime tells the policy the value must not be cached;
/// the entry (and any stale predecessor) is dropped instead.
#[derive(Clone, Debug)]
pub struct Generated<V> {
    value: V,
    ttl: Option<Duration>,
}

impl<V> Generated<V> {
    /// Wraps a fresh value with the policy-default lifetime.
    pub fn new(value: V) -> Self {
        Self { value, ttl: None }
    }

    /// Wraps a fresh value with an explicit lifetime.
    ///
    /// `Duration::ZERO` means "do not cache this value".
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Self { value, ttl: Some(ttl) }
    }

    /// Returns a reference to the fresh value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    pub(crate) fn into_parts(self) -> (V, Option<Duration>) {
        (self.value, self.ttl)
    }
}

/// The producer a policy calls to regenerate a value.
pub type GenerateFn<V> =
    Arc<dyn Fn(Key) -> BoxFuture<'static, Result<Generated<V>, Error>> + Send + Sync>;

/// A staleness decision function: `(stored, remaining ttl) → threshold`.
pub type StaleInFn = Arc<dyn Fn(SystemTime, Duration) -> Duration + Send + Sync>;

/// When an entry is considered stale.
#[derive(Clone)]
pub enum StaleIn {
    /// Entries at least this old are stale.
    After(Duration),
    /// The threshold is computed per entry from its write instant and
    /// remaining lifetime.
    Decide(StaleInFn),
}

impl fmt::Debug for StaleIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::After(d) => f.debug_tuple("After").field(d).finish(),
            Self::Decide(_) => f.debug_tuple("Decide").field(&"..").finish(),
        }
    }
}

/// Bound on how long a miss waits for the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerateTimeout {
    /// Waiters receive a timeout error after this long.
    After(Duration),
    /// Waiters are bound to the producer with no upper bound.
    Disabled,
}

/// Expiration of cached entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// Entries live this long after they are written.
    In(Duration),
    /// Entries live until the next daily occurrence of this local clock time.
    At(DayTime),
}

/// A local wall-clock time of day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DayTime {
    pub hours: u8,
    pub minutes: u8,
}

impl DayTime {
    /// Parses `"H:MM"` / `"HH:MM"`.
    fn parse(text: &str) -> Option<Self> {
        let (hours, minutes) = text.split_once(':')?;
        if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
            return None;
        }
        if !hours.bytes().all(|b| b.is_ascii_digit()) || !minutes.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hours: u8 = hours.parse().ok()?;
        let minutes: u8 = minutes.parse().ok()?;
        (hours <= 23 && minutes <= 59).then_some(Self { hours, minutes })
    }
}

/// A configuration violation found at compile time.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuleError {
    /// `expires_in` and `expires_at` were both set.
    ExpiresConflict,
    /// `expires_at` is not a valid `HH:MM` clock time.
    InvalidExpiresAt(String),
    /// `expires_in` must be positive.
    ZeroExpiresIn,
    /// `stale_in` must be within `[1ms, 86_399_999ms]`.
    StaleInOutOfRange,
    /// A numeric `stale_in` must be strictly less than `expires_in`.
    StaleInNotBeforeExpiry,
    /// Stale options require a generate function.
    StaleRequiresGenerate,
    /// Stale options require `stale_timeout`.
    StaleRequiresStaleTimeout,
    /// Stale options require a storage backend.
    StaleRequiresStore,
    /// `stale_timeout` must be positive.
    ZeroStaleTimeout,
    /// `stale_timeout` must leave room before the entry expires.
    StaleTimeoutTooLong,
    /// `stale_timeout` must be less than `pending_generate_timeout`.
    StaleTimeoutNotBeforePendingWindow,
    /// A generate function requires `generate_timeout`.
    GenerateRequiresTimeout,
    /// The named option is meaningless without a generate function.
    RequiresGenerate(&'static str),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpiresConflict => write!(f, "expires_in and expires_at are mutually exclusive"),
            Self::InvalidExpiresAt(text) => write!(f, "expires_at is not a valid HH:MM clock time: {text:?}"),
            Self::ZeroExpiresIn => write!(f, "expires_in must be positive"),
            Self::StaleInOutOfRange => write!(f, "stale_in must be within [1ms, 86399999ms]"),
            Self::StaleInNotBeforeExpiry => write!(f, "stale_in must be less than expires_in"),
            Self::StaleRequiresGenerate => write!(f, "stale_in requires a generate function"),
            Self::StaleRequiresStaleTimeout => write!(f, "stale_in requires stale_timeout"),
            Self::StaleRequiresStore => write!(f, "stale_in requires a storage backend"),
            Self::ZeroStaleTimeout => write!(f, "stale_timeout must be positive"),
            Self::StaleTimeoutTooLong => write!(f, "stale_timeout must leave room before the entry expires"),
            Self::StaleTimeoutNotBeforePendingWindow => {
                write!(f, "stale_timeout must be less than pending_generate_timeout")
            }
            Self::GenerateRequiresTimeout => write!(f, "a generate function requires generate_timeout"),
            Self::RequiresGenerate(option) => write!(f, "{option} is meaningless without a generate function"),
        }
    }
}

impl std::error::Error for RuleError {}

/// Caller-facing policy configuration.
///
/// Build one with chained setters and hand it to
/// [`Policy::new`](crate::Policy::new) (or
/// [`Policy::set_rules`](crate::Policy::set_rules) to swap configuration on a
/// live policy). An empty `Rules` compiles to a rule that caches nothing.
///
/// # Examples
///
/// ```
/// use larder::{Generated, Rules};
/// use std::time::Duration;
///
/// let rules: Rules<String> = Rules::new()
///     .expires_in(Duration::from_secs(60))
///     .stale_in(Duration::from_secs(30))
///     .stale_timeout(Duration::from_millis(100))
///     .generate_timeout(Duration::from_secs(2))
///     .generate(|key| async move { Ok(Generated::new(format!("fresh {}", key.id()))) });
/// ```
pub struct Rules<V> {
    pub(crate) expires_in: Option<Duration>,
    pub(crate) expires_at: Option<String>,
    pub(crate) stale_in: Option<StaleIn>,
    pub(crate) stale_timeout: Option<Duration>,
    pub(crate) generate_fn: Option<GenerateFn<V>>,
    pub(crate) generate_timeout: Option<GenerateTimeout>,
    pub(crate) generate_on_read_error: Option<bool>,
    pub(crate) generate_ignore_write_error: Option<bool>,
    pub(crate) drop_on_error: Option<bool>,
    pub(crate) pending_generate_timeout: Option<Duration>,
}

impl<V> Default for Rules<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Rules<V> {
    fn clone(&self) -> Self {
        Self {
            expires_in: self.expires_in,
            expires_at: self.expires_at.clone(),
            stale_in: self.stale_in.clone(),
            stale_timeout: self.stale_timeout,
            generate_fn: self.generate_fn.clone(),
            generate_timeout: self.generate_timeout,
            generate_on_read_error: self.generate_on_read_error,
            generate_ignore_write_error: self.generate_ignore_write_error,
            drop_on_error: self.drop_on_error,
            pending_generate_timeout: self.pending_generate_timeout,
        }
    }
}

impl<V> fmt::Debug for Rules<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("stale_in", &self.stale_in)
            .field("stale_timeout", &self.stale_timeout)
            .field("generate_fn", &self.generate_fn.as_ref().map(|_| ".."))
            .field("generate_timeout", &self.generate_timeout)
            .finish_non_exhaustive()
    }
}

impl<V> Rules<V> {
    /// Creates an empty configuration (caching disabled).
    #[must_use]
    pub fn new() -> Self {
        Self {
            expires_in: None,
            expires_at: None,
            stale_in: None,
            stale_timeout: None,
            generate_fn: None,
            generate_timeout: None,
            generate_on_read_error: None,
            generate_ignore_write_error: None,
            drop_on_error: None,
            pending_generate_timeout: None,
        }
    }

    /// Entries live this long after they are written.
    ///
    /// Mutually exclusive with [`expires_at`](Self::expires_at).
    #[must_use]
    pub fn expires_in(mut self, lifetime: Duration) -> Self {
        self.expires_in = Some(lifetime);
        self
    }

    /// Entries live until the next daily occurrence of this local clock time,
    /// given as `"HH:MM"`.
    ///
    /// Mutually exclusive with [`expires_in`](Self::expires_in).
    #[must_use]
    pub fn expires_at(mut self, clock_time: impl Into<String>) -> Self {
        self.expires_at = Some(clock_time.into());
        self
    }

    /// Entries at least this old are stale and trigger background
    /// regeneration on read.
    ///
    /// Requires a generate function, [`stale_timeout`](Self::stale_timeout),
    /// and a storage backend.
    #[must_use]
    pub fn stale_in(mut self, age: Duration) -> Self {
        self.stale_in = Some(StaleIn::After(age));
        self
    }

    /// Like [`stale_in`](Self::stale_in), but the threshold is computed per
    /// entry from its write instant and remaining lifetime.
    #[must_use]
    pub fn stale_in_with<F>(mut self, decide: F) -> Self
    where
        F: Fn(SystemTime, Duration) -> Duration + Send + Sync + 'static,
    {
        self.stale_in = Some(StaleIn::Decide(Arc::new(decide)));
        self
    }

    /// How long a stale read waits for the producer before serving the stale
    /// value.
    #[must_use]
    pub fn stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout = Some(timeout);
        self
    }

    /// Sets the producer used to regenerate values.
    ///
    /// Requires [`generate_timeout`](Self::generate_timeout) (or its
    /// [`Disabled`](GenerateTimeout::Disabled) sentinel via
    /// [`generate_timeout_disabled`](Self::generate_timeout_disabled)).
    #[must_use]
    pub fn generate<F, Fut>(mut self, producer: F) -> Self
    where
        F: Fn(Key) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Generated<V>, Error>> + Send + 'static,
    {
        self.generate_fn = Some(Arc::new(move |key| Box::pin(producer(key))));
        self
    }

    /// How long a miss waits for the producer before failing with a timeout
    /// error.
    #[must_use]
    pub fn generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = Some(GenerateTimeout::After(timeout));
        self
    }

    /// Lets misses wait for the producer without bound.
    #[must_use]
    pub fn generate_timeout_disabled(mut self) -> Self {
        self.generate_timeout = Some(GenerateTimeout::Disabled);
        self
    }

    /// Whether a store read error is masked by running the producer
    /// (default true).
    #[must_use]
    pub fn generate_on_read_error(mut self, enabled: bool) -> Self {
        self.generate_on_read_error = Some(enabled);
        self
    }

    /// Whether a failed write-back is ignored rather than surfaced to waiters
    /// (default true).
    #[must_use]
    pub fn generate_ignore_write_error(mut self, enabled: bool) -> Self {
        self.generate_ignore_write_error = Some(enabled);
        self
    }

    /// Whether a producer error invalidates the cached entry (default true).
    ///
    /// When false, the stale entry keeps serving and the error is surfaced
    /// alongside it.
    #[must_use]
    pub fn drop_on_error(mut self, enabled: bool) -> Self {
        self.drop_on_error = Some(enabled);
        self
    }

    /// Window during which a repeat producer run for the same id is
    /// suppressed (default zero: no suppression).
    #[must_use]
    pub fn pending_generate_timeout(mut self, window: Duration) -> Self {
        self.pending_generate_timeout = Some(window);
        self
    }
}

/// A compiled, validated rule. Immutable for its lifetime; a policy swaps the
/// whole rule atomically.
pub(crate) struct Rule<V> {
    pub(crate) expiry: Option<Expiry>,
    pub(crate) stale_in: Option<StaleIn>,
    pub(crate) stale_timeout: Option<Duration>,
    pub(crate) generate_fn: Option<GenerateFn<V>>,
    pub(crate) generate_timeout: Option<GenerateTimeout>,
    pub(crate) generate_on_read_error: bool,
    pub(crate) generate_ignore_write_error: bool,
    pub(crate) drop_on_error: bool,
    pub(crate) pending_generate_timeout: Duration,
}

impl<V> fmt::Debug for Rule<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("expiry", &self.expiry)
            .field("stale_in", &self.stale_in)
            .field("stale_timeout", &self.stale_timeout)
            .field("generate_fn", &self.generate_fn.as_ref().map(|_| ".."))
            .field("generate_timeout", &self.generate_timeout)
            .finish_non_exhaustive()
    }
}

impl<V> Rule<V> {
    /// Validates and normalizes a configuration. The first violation aborts.
    ///
    /// `server_side` is true when the owning policy has a storage backend;
    /// stale options are only legal server-side.
    pub(crate) fn compile(rules: Rules<V>, server_side: bool) -> Result<Self, RuleError> {
        if rules.expires_in.is_some() && rules.expires_at.is_some() {
            return Err(RuleError::ExpiresConflict);
        }

        let expiry = match (rules.expires_in, rules.expires_at) {
            (Some(lifetime), None) => {
                if lifetime.is_zero() {
                    return Err(RuleError::ZeroExpiresIn);
                }
                Some(Expiry::In(lifetime))
            }
            (None, Some(text)) => {
                let at = DayTime::parse(&text).ok_or(RuleError::InvalidExpiresAt(text))?;
                Some(Expiry::At(at))
            }
            (None, None) => None,
            (Some(_), Some(_)) => unreachable!("checked above"),
        };

        if let Some(StaleIn::After(age)) = &rules.stale_in {
            if age.is_zero() || *age > STALE_IN_MAX {
                return Err(RuleError::StaleInOutOfRange);
            }
            if let Some(Expiry::In(lifetime)) = expiry {
                if *age >= lifetime {
                    return Err(RuleError::StaleInNotBeforeExpiry);
                }
            }
        }

        if rules.stale_in.is_some() {
            if rules.generate_fn.is_none() {
                return Err(RuleError::StaleRequiresGenerate);
            }
            if rules.stale_timeout.is_none() {
                return Err(RuleError::StaleRequiresStaleTimeout);
            }
            if !server_side {
                return Err(RuleError::StaleRequiresStore);
            }
        }

        if let Some(stale_timeout) = rules.stale_timeout {
            if stale_timeout.is_zero() {
                return Err(RuleError::ZeroStaleTimeout);
            }
            if let Some(Expiry::In(lifetime)) = expiry {
                if stale_timeout >= lifetime {
                    return Err(RuleError::StaleTimeoutTooLong);
                }
                if let Some(StaleIn::After(age)) = &rules.stale_in {
                    if stale_timeout >= lifetime - *age {
                        return Err(RuleError::StaleTimeoutTooLong);
                    }
                }
            }
            if let Some(window) = rules.pending_generate_timeout {
                if !window.is_zero() && stale_timeout >= window {
                    return Err(RuleError::StaleTimeoutNotBeforePendingWindow);
                }
            }
        }

        if rules.generate_fn.is_some() && rules.generate_timeout.is_none() {
            return Err(RuleError::GenerateRequiresTimeout);
        }

        if rules.generate_fn.is_none() {
            if rules.generate_on_read_error.is_some() {
                return Err(RuleError::RequiresGenerate("generate_on_read_error"));
            }
            if rules.generate_ignore_write_error.is_some() {
                return Err(RuleError::RequiresGenerate("generate_ignore_write_error"));
            }
            if rules.drop_on_error.is_some() {
                return Err(RuleError::RequiresGenerate("drop_on_error"));
            }
        }

        let has_generate = rules.generate_fn.is_some();

        Ok(Self {
            expiry,
            stale_in: rules.stale_in,
            stale_timeout: rules.stale_timeout,
            generate_fn: rules.generate_fn,
            generate_timeout: rules.generate_timeout,
            generate_on_read_error: rules.generate_on_read_error.unwrap_or(true),
            generate_ignore_write_error: rules.generate_ignore_write_error.unwrap_or(true),
            drop_on_error: rules.drop_on_error.unwrap_or(has_generate),
            pending_generate_timeout: rules.pending_generate_timeout.unwrap_or(Duration::ZERO),
        })
    }

    /// Remaining lifetime of an entry created at `created`, observed at `now`.
    pub(crate) fn remaining_ttl(&self, created: SystemTime, now: SystemTime) -> Duration {
        ttl::remaining(self.expiry.as_ref(), created, now)
    }

    /// Whether an entry is stale under this rule at `now`.
    pub(crate) fn is_stale(&self, entry: &StoredEntry<V>, now: SystemTime) -> bool {
        let Some(stale_in) = &self.stale_in else {
            return false;
        };
        let threshold = match stale_in {
            StaleIn::After(age) => *age,
            StaleIn::Decide(decide) => decide(entry.stored(), entry.ttl()),
        };
        entry.age(now) >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Rules<u32> {
        Rules::new()
    }

    fn with_generate(rules: Rules<u32>) -> Rules<u32> {
        rules
            .generate(|_key| async { Ok(Generated::new(1)) })
            .generate_timeout(Duration::from_secs(1))
    }

    #[test]
    fn empty_rules_compile_to_a_disabled_rule() {
        let rule = Rule::compile(base(), true).unwrap();
        assert!(rule.expiry.is_none());
        assert!(rule.generate_fn.is_none());
        assert!(rule.generate_on_read_error);
        assert!(rule.generate_ignore_write_error);
        assert!(!rule.drop_on_error);
        assert_eq!(rule.pending_generate_timeout, Duration::ZERO);
    }

    #[test]
    fn compilation_is_idempotent() {
        let make = || {
            base()
                .expires_in(Duration::from_secs(60))
                .stale_in(Duration::from_secs(30))
                .stale_timeout(Duration::from_millis(100))
                .pipe(with_generate)
        };
        let a = Rule::compile(make(), true).unwrap();
        let b = Rule::compile(make(), true).unwrap();

        assert_eq!(a.expiry, b.expiry);
        assert_eq!(a.stale_timeout, b.stale_timeout);
        assert_eq!(a.generate_timeout, b.generate_timeout);
        assert_eq!(a.drop_on_error, b.drop_on_error);
    }

    #[test]
    fn expires_in_and_at_are_mutually_exclusive() {
        let rules = base().expires_in(Duration::from_secs(1)).expires_at("03:00");
        assert_eq!(Rule::compile(rules, true).unwrap_err(), RuleError::ExpiresConflict);
    }

    #[test]
    fn expires_in_must_be_positive() {
        let rules = base().expires_in(Duration::ZERO);
        assert_eq!(Rule::compile(rules, true).unwrap_err(), RuleError::ZeroExpiresIn);
    }

    #[test]
    fn expires_at_accepts_one_and_two_digit_hours() {
        for text in ["3:00", "03:00", "23:59", "0:07"] {
            assert!(Rule::compile(base().expires_at(text), true).is_ok(), "{text}");
        }
    }

    #[test]
    fn expires_at_rejects_malformed_clock_times() {
        for text in ["24:00", "12:60", "003:00", "3:0", "3:000", "noon", "12", ":30", "12:", "-1:30", "1２:00"] {
            let err = Rule::compile(base().expires_at(text), true).unwrap_err();
            assert_eq!(err, RuleError::InvalidExpiresAt(text.to_string()), "{text}");
        }
    }

    #[test]
    fn stale_in_requires_generate_timeout_and_store() {
        let staleish = || {
            base()
                .expires_in(Duration::from_secs(60))
                .stale_in(Duration::from_secs(30))
        };

        assert_eq!(
            Rule::compile(staleish(), true).unwrap_err(),
            RuleError::StaleRequiresGenerate
        );

        let no_timeout = with_generate(staleish());
        assert_eq!(
            Rule::compile(no_timeout, true).unwrap_err(),
            RuleError::StaleRequiresStaleTimeout
        );

        let client_side = with_generate(staleish()).stale_timeout(Duration::from_millis(100));
        assert_eq!(
            Rule::compile(client_side, false).unwrap_err(),
            RuleError::StaleRequiresStore
        );
    }

    #[test]
    fn stale_in_must_be_before_expiry() {
        let rules = with_generate(
            base()
                .expires_in(Duration::from_secs(30))
                .stale_in(Duration::from_secs(30))
                .stale_timeout(Duration::from_millis(100)),
        );
        assert_eq!(Rule::compile(rules, true).unwrap_err(), RuleError::StaleInNotBeforeExpiry);
    }

    #[test]
    fn stale_in_range_is_bounded() {
        let too_big = with_generate(
            base()
                .stale_in(Duration::from_millis(86_400_000))
                .stale_timeout(Duration::from_millis(100)),
        );
        assert_eq!(Rule::compile(too_big, true).unwrap_err(), RuleError::StaleInOutOfRange);

        let zero = with_generate(base().stale_in(Duration::ZERO).stale_timeout(Duration::from_millis(100)));
        assert_eq!(Rule::compile(zero, true).unwrap_err(), RuleError::StaleInOutOfRange);
    }

    #[test]
    fn stale_timeout_must_leave_room_before_expiry() {
        // stale_timeout >= expires_in - stale_in
        let rules = with_generate(
            base()
                .expires_in(Duration::from_millis(1000))
                .stale_in(Duration::from_millis(900))
                .stale_timeout(Duration::from_millis(200)),
        );
        assert_eq!(Rule::compile(rules, true).unwrap_err(), RuleError::StaleTimeoutTooLong);

        // stale_timeout >= expires_in
        let rules = with_generate(
            base()
                .expires_in(Duration::from_millis(100))
                .stale_timeout(Duration::from_millis(100)),
        );
        assert_eq!(Rule::compile(rules, true).unwrap_err(), RuleError::StaleTimeoutTooLong);
    }

    #[test]
    fn stale_timeout_must_fit_inside_pending_window() {
        let rules = with_generate(
            base()
                .expires_in(Duration::from_secs(60))
                .stale_in(Duration::from_secs(30))
                .stale_timeout(Duration::from_millis(500))
                .pending_generate_timeout(Duration::from_millis(500)),
        );
        assert_eq!(
            Rule::compile(rules, true).unwrap_err(),
            RuleError::StaleTimeoutNotBeforePendingWindow
        );
    }

    #[test]
    fn generate_requires_a_timeout_setting() {
        let rules: Rules<u32> = base().generate(|_key| async { Ok(Generated::new(1)) });
        assert_eq!(Rule::compile(rules, true).unwrap_err(), RuleError::GenerateRequiresTimeout);

        let disabled = base()
            .generate(|_key| async { Ok(Generated::new(1)) })
            .generate_timeout_disabled();
        let rule = Rule::compile(disabled, true).unwrap();
        assert_eq!(rule.generate_timeout, Some(GenerateTimeout::Disabled));
    }

    #[test]
    fn generator_flags_require_a_generator() {
        for (rules, option) in [
            (base().generate_on_read_error(false), "generate_on_read_error"),
            (base().generate_ignore_write_error(false), "generate_ignore_write_error"),
            (base().drop_on_error(false), "drop_on_error"),
        ] {
            assert_eq!(
                Rule::compile(rules, true).unwrap_err(),
                RuleError::RequiresGenerate(option)
            );
        }
    }

    #[test]
    fn generator_defaults_materialize() {
        let rule = Rule::compile(with_generate(base()), true).unwrap();
        assert!(rule.generate_on_read_error);
        assert!(rule.generate_ignore_write_error);
        assert!(rule.drop_on_error);
    }

    #[test]
    fn stale_in_function_is_consulted_per_entry() {
        let rules = with_generate(
            base()
                .expires_in(Duration::from_secs(60))
                .stale_in_with(|_stored, ttl| ttl / 2)
                .stale_timeout(Duration::from_millis(100)),
        );
        let rule = Rule::compile(rules, true).unwrap();

        let stored = SystemTime::UNIX_EPOCH;
        // threshold = ttl/2 = 5s; age 6s -> stale, age 4s -> fresh
        let entry = StoredEntry::new(1, stored, Duration::from_secs(10));
        assert!(rule.is_stale(&entry, stored + Duration::from_secs(6)));
        assert!(!rule.is_stale(&entry, stored + Duration::from_secs(4)));
    }

    #[test]
    fn scalar_staleness_compares_age() {
        let rules = with_generate(
            base()
                .expires_in(Duration::from_millis(1000))
                .stale_in(Duration::from_millis(500))
                .stale_timeout(Duration::from_millis(100)),
        );
        let rule = Rule::compile(rules, true).unwrap();

        let stored = SystemTime::UNIX_EPOCH + Duration::from_secs(1);
        let entry = StoredEntry::new(1, stored, Duration::from_millis(400));
        assert!(rule.is_stale(&entry, stored + Duration::from_millis(600)));
        assert!(rule.is_stale(&entry, stored + Duration::from_millis(500)));
        assert!(!rule.is_stale(&entry, stored + Duration::from_millis(499)));
    }

    #[test]
    fn no_stale_rule_is_never_stale() {
        let rule = Rule::compile(base().expires_in(Duration::from_secs(1)), true).unwrap();
        let entry = StoredEntry::new(1, SystemTime::UNIX_EPOCH, Duration::ZERO);
        assert!(!rule.is_stale(&entry, SystemTime::UNIX_EPOCH + Duration::from_secs(100)));
    }

    // Small helper so test rule chains read top-down.
    trait Pipe: Sized {
        fn pipe<T>(self, f: impl FnOnce(Self) -> T) -> T {
            f(self)
        }
    }
    impl<T> Pipe for T {}
}
