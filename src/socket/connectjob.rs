use crate::base::neterror::NetError;
use crate::dns::{BoundedResolver, CancellationQueue, Hints, Name};
use crate::socket::options::ConnectOptions;
use crate::socket::race::race_connect;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Budgets below this are raised to it before resolution starts.
pub const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);
/// The connection race always gets at least this long, however much of
/// the budget resolution used.
pub const MIN_RACE_BUDGET: Duration = Duration::from_millis(1000);

/// Manages the connection process: bounded DNS -> raced TCP connect.
/// Roughly equivalent to net::ConnectJob.
#[derive(Clone, Debug)]
pub struct ConnectJob {
    resolver: BoundedResolver,
}

impl ConnectJob {
    pub fn new(resolver: BoundedResolver) -> Self {
        Self { resolver }
    }

    /// A job on the system resolver, deferring abandoned lookups to `pending`.
    pub fn system(pending: Arc<CancellationQueue>) -> Self {
        Self::new(BoundedResolver::system(pending))
    }

    pub fn resolver(&self) -> &BoundedResolver {
        &self.resolver
    }

    /// Resolves `name`:`service` and races connects to every address.
    ///
    /// `timeout` (at least [`MIN_CONNECT_TIMEOUT`]) bounds the lookup; the
    /// race then gets whatever is left, but never less than
    /// [`MIN_RACE_BUDGET`].
    ///
    /// A failed lookup is reported as [`NetError::AddressInvalid`], with the
    /// resolver's own error in `options.resolver_error`. When
    /// `options.report_details` is set the resolved list is handed over in
    /// `options.details`, on success and on failure.
    pub async fn connect_by_name(
        &self,
        name: &str,
        service: &str,
        timeout: Duration,
        options: &mut ConnectOptions,
    ) -> Result<TcpStream, NetError> {
        options.clear_outputs();
        let mut budget = timeout.max(MIN_CONNECT_TIMEOUT);

        let list = match self
            .resolver
            .resolve(&Name::new(name), service, &Hints::stream(), &mut budget)
            .await
        {
            Ok(list) => list,
            Err(e) => {
                tracing::debug!(host = name, service, error = %e, "name resolution failed");
                options.resolver_error = Some(e);
                return Err(NetError::AddressInvalid);
            }
        };

        let race_budget = budget.max(MIN_RACE_BUDGET);
        tracing::debug!(host = name, addresses = list.len(), budget = ?race_budget, "racing connects");

        // The race blocks in poll(2), so it runs on the blocking pool.
        let mut race_options = options.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = race_connect(&list, race_budget, &mut race_options);
            (result, list, race_options)
        })
        .await;

        let (result, list, race_options) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(host = name, error = %e, "connection race task failed");
                return Err(NetError::RaceAborted);
            }
        };

        *options = race_options;
        if let Some(details) = options.details.as_mut() {
            details.addresses = Some(list);
        }

        let stream = result?;
        TcpStream::from_std(stream).map_err(|e| {
            tracing::error!(host = name, error = %e, "failed to register connected stream");
            NetError::RaceAborted
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{
        CompletedLookup, LookupRequest, PendingLookup, Resolve, ResolvedList, ResolverError,
    };

    struct Fixed(Result<ResolvedList, ResolverError>);

    impl Resolve for Fixed {
        fn submit(&self, _request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
            Ok(Box::new(CompletedLookup::new(self.0.clone())))
        }
    }

    fn job(answer: Result<ResolvedList, ResolverError>) -> ConnectJob {
        ConnectJob::new(BoundedResolver::new(
            Arc::new(Fixed(answer)),
            Arc::new(CancellationQueue::new()),
        ))
    }

    #[tokio::test]
    async fn test_resolution_failure_is_masked() {
        let job = job(Err(ResolverError::NoName));
        let mut options = ConnectOptions::new();

        let err = job
            .connect_by_name("missing.example", "80", Duration::from_secs(1), &mut options)
            .await
            .unwrap_err();

        assert_eq!(err, NetError::AddressInvalid);
        assert_eq!(err.os_error(), libc::EFAULT);
        assert_eq!(options.resolver_error, Some(ResolverError::NoName));
    }

    #[tokio::test]
    async fn test_connects_and_returns_list_in_details() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let job = job(Ok(vec![addr].into_iter().collect()));
        let mut options = ConnectOptions::new().report_picked(true).report_details(true);

        let stream = job
            .connect_by_name("local.test", "0", Duration::from_millis(10), &mut options)
            .await
            .unwrap();

        assert_eq!(stream.peer_addr().unwrap(), addr);
        assert_eq!(options.picked.as_ref().map(|p| p.socket_addr()), Some(addr));
        let details = options.details.as_ref().unwrap();
        assert_eq!(details.addresses.as_ref().map(|l| l.len()), Some(1));
        assert_eq!(details.results[0].os_error, None);
        assert!(options.resolver_error.is_none());
    }
}
