// SPDX-License-Identifier: Apache-2.0

//! Resilient statement acquisition over a single mutable connection handle.
//!
//! The handle moves through `Open -> Stale -> Closed -> Open` as the source
//! detects failures and refreshes it from a connection provider. Acquisition
//! runs as a bounded loop: up to `max_retries` lenient attempts, each
//! failure followed by a conditional refresh, then one strict final attempt
//! whose failure is fatal.
//!
//! Refresh is conditional, not automatic. A handle that still reports
//! itself open is kept; teardown happens only when the handle says it is
//! closed or the diagnostic itself cannot be trusted. The old handle is
//! fully closed before a replacement is installed.

use tracing::{debug, error, info, warn};

use crate::error::{AcquireError, HandleError};

/// Collaborator that can mint replacement connection handles.
pub trait ConnectionProvider {
    type Handle: ManagedConnection;

    fn connect(&mut self) -> Result<Self::Handle, HandleError>;
}

/// One mutable connection handle as seen by the retry engine.
pub trait ManagedConnection {
    /// Probe whether a statement can be prepared on this handle right now.
    fn try_prepare(&mut self, sql: &str) -> Result<(), HandleError>;

    /// Diagnostic: does the handle report itself closed?
    fn is_closed(&mut self) -> Result<bool, HandleError>;

    /// Best-effort close. Failures are the caller's to swallow.
    fn close(&mut self) -> Result<(), HandleError>;
}

/// Outcome of one lenient acquisition attempt.
enum Attempt {
    Ready,
    Retry,
}

/// Wraps one connection handle and recovers from stale or broken
/// connections without failing the caller outright.
pub struct StatementSource<P: ConnectionProvider> {
    provider: P,
    handle: P::Handle,
    max_retries: u32,
}

impl<P: ConnectionProvider> StatementSource<P> {
    /// Build a source around an already-open handle.
    pub fn new(provider: P, handle: P::Handle, max_retries: u32) -> Self {
        Self {
            provider,
            handle,
            max_retries,
        }
    }

    /// Obtain the initial handle from the provider and build the source.
    pub fn open(mut provider: P, max_retries: u32) -> Result<Self, AcquireError> {
        let handle = provider.connect().map_err(AcquireError::Connect)?;
        Ok(Self::new(provider, handle, max_retries))
    }

    pub fn handle(&self) -> &P::Handle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut P::Handle {
        &mut self.handle
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Drive the handle to a state where `sql` can be prepared.
    ///
    /// Lenient attempts swallow the preparation failure, run the
    /// conditional refresh and try again. Once the retry budget is spent,
    /// the final attempt is strict: its failure propagates as
    /// [`AcquireError::StatementAcquisition`] with the total attempt count.
    pub fn ensure_ready(&mut self, sql: &str) -> Result<(), AcquireError> {
        let mut attempts = 0;

        while attempts < self.max_retries {
            match self.lenient_attempt(sql)? {
                Attempt::Ready => return Ok(()),
                Attempt::Retry => attempts += 1,
            }
        }

        self.handle
            .try_prepare(sql)
            .map_err(|source| AcquireError::StatementAcquisition {
                attempts: attempts + 1,
                source,
            })
    }

    fn lenient_attempt(&mut self, sql: &str) -> Result<Attempt, AcquireError> {
        match self.handle.try_prepare(sql) {
            Ok(()) => Ok(Attempt::Ready),
            Err(e) => {
                warn!(error = %e, "failed to prepare a statement, considering a refresh");
                self.refresh()?;
                Ok(Attempt::Retry)
            }
        }
    }

    /// Replace the handle with a fresh one from the provider, but only when
    /// the diagnostic warrants it.
    fn refresh(&mut self) -> Result<(), AcquireError> {
        if !self.should_refresh() {
            info!("no reason to refresh the connection at this time");
            return Ok(());
        }

        if let Err(e) = self.handle.close() {
            // Close is best-effort; the failure must not mask the refresh.
            warn!(error = %e, "failed to close the stale connection, continuing");
        }

        info!("getting a new connection from the provider");
        self.handle = self.provider.connect().map_err(AcquireError::Connect)?;
        debug!("replacement connection installed");
        Ok(())
    }

    fn should_refresh(&mut self) -> bool {
        match self.handle.is_closed() {
            Ok(closed) => closed,
            Err(e) => {
                error!(error = %e, "could not check the connection closed state, assuming a refresh is needed");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Counters {
        prepares: u32,
        closes: u32,
        connects: u32,
    }

    /// Scripted handle: pops one prepare outcome per attempt, repeating the
    /// last one once the script runs dry.
    struct ScriptedHandle {
        prepare_failures: u32,
        reports_closed: Result<bool, ()>,
        counters: Rc<RefCell<Counters>>,
    }

    impl ManagedConnection for ScriptedHandle {
        fn try_prepare(&mut self, _sql: &str) -> Result<(), HandleError> {
            self.counters.borrow_mut().prepares += 1;
            if self.prepare_failures > 0 {
                self.prepare_failures -= 1;
                Err(HandleError::new("prepare", "scripted failure"))
            } else {
                Ok(())
            }
        }

        fn is_closed(&mut self) -> Result<bool, HandleError> {
            self.reports_closed
                .map_err(|_| HandleError::new("diagnostic", "scripted diagnostic failure"))
        }

        fn close(&mut self) -> Result<(), HandleError> {
            self.counters.borrow_mut().closes += 1;
            Ok(())
        }
    }

    struct ScriptedProvider {
        replacements: VecDeque<ScriptedHandle>,
        counters: Rc<RefCell<Counters>>,
    }

    impl ConnectionProvider for ScriptedProvider {
        type Handle = ScriptedHandle;

        fn connect(&mut self) -> Result<ScriptedHandle, HandleError> {
            self.counters.borrow_mut().connects += 1;
            self.replacements
                .pop_front()
                .ok_or_else(|| HandleError::new("connect", "no replacement available"))
        }
    }

    fn fixture(
        first: ScriptedHandle,
        replacements: Vec<ScriptedHandle>,
        counters: &Rc<RefCell<Counters>>,
    ) -> StatementSource<ScriptedProvider> {
        let provider = ScriptedProvider {
            replacements: replacements.into(),
            counters: Rc::clone(counters),
        };
        StatementSource::new(provider, first, 2)
    }

    fn handle(
        prepare_failures: u32,
        reports_closed: Result<bool, ()>,
        counters: &Rc<RefCell<Counters>>,
    ) -> ScriptedHandle {
        ScriptedHandle {
            prepare_failures,
            reports_closed,
            counters: Rc::clone(counters),
        }
    }

    #[test]
    fn closed_handle_is_refreshed_exactly_once_before_succeeding() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let broken = handle(u32::MAX, Ok(true), &counters);
        let healthy = handle(0, Ok(false), &counters);
        let mut source = fixture(broken, vec![healthy], &counters);

        source.ensure_ready("SELECT 1").unwrap();

        let c = counters.borrow();
        assert_eq!(c.connects, 1);
        assert_eq!(c.closes, 1);
        // First attempt fails on the broken handle, second succeeds on the
        // replacement.
        assert_eq!(c.prepares, 2);
    }

    #[test]
    fn exhausted_retries_make_three_attempts_then_fail_strictly() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let broken = handle(u32::MAX, Ok(true), &counters);
        let replacements = vec![
            handle(u32::MAX, Ok(true), &counters),
            handle(u32::MAX, Ok(true), &counters),
        ];
        let mut source = fixture(broken, replacements, &counters);

        let err = source.ensure_ready("SELECT 1").unwrap_err();

        match err {
            AcquireError::StatementAcquisition { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected StatementAcquisition, got {other:?}"),
        }
        assert_eq!(counters.borrow().prepares, 3);
    }

    #[test]
    fn open_handle_is_not_torn_down_on_a_soft_signal() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        // Fails once, reports itself open, then succeeds on the retry.
        let flaky = handle(1, Ok(false), &counters);
        let mut source = fixture(flaky, Vec::new(), &counters);

        source.ensure_ready("SELECT 1").unwrap();

        let c = counters.borrow();
        assert_eq!(c.connects, 0);
        assert_eq!(c.closes, 0);
        assert_eq!(c.prepares, 2);
    }

    #[test]
    fn untrusted_diagnostics_force_a_refresh() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let undiagnosable = handle(u32::MAX, Err(()), &counters);
        let healthy = handle(0, Ok(false), &counters);
        let mut source = fixture(undiagnosable, vec![healthy], &counters);

        source.ensure_ready("SELECT 1").unwrap();
        assert_eq!(counters.borrow().connects, 1);
    }

    #[test]
    fn failed_replacement_propagates_as_connect_error() {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let broken = handle(u32::MAX, Ok(true), &counters);
        let mut source = fixture(broken, Vec::new(), &counters);

        let err = source.ensure_ready("SELECT 1").unwrap_err();
        assert!(matches!(err, AcquireError::Connect(_)));
    }
}
