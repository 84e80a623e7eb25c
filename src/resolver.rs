use crate::config::AddressFamily;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::{system_conf, TokioAsyncResolver};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("could not resolve {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("no {family} address found for {host}")]
    NoAddressFound { host: String, family: AddressFamily },
    #[error("lookup of {host} timed out")]
    TimedOut { host: String },
}

/// Source of candidate endpoints for a host name.
pub trait NameService {
    fn lookup(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Vec<SocketAddr>>> + Send;
}

/// Async DNS resolver honoring /etc/hosts and the system resolver config.
/// Lookups are plain futures, so a timed-out or abandoned query is dropped
/// with nothing left running. The answer cache is disabled.
#[derive(Clone)]
pub struct SystemNameService {
    resolver: TokioAsyncResolver,
}

impl SystemNameService {
    pub fn new(limit: Option<Duration>) -> Self {
        let (config, opts) = system_conf::read_system_conf().unwrap_or_else(|e| {
            warn!("cannot read system resolver config, using defaults: {e}");
            (ResolverConfig::default(), ResolverOpts::default())
        });
        Self::with_config(config, opts, limit)
    }

    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts, limit: Option<Duration>) -> Self {
        if let Some(limit) = limit {
            opts.timeout = limit;
        }
        opts.cache_size = 0;
        opts.use_hosts_file = true;
        Self { resolver: TokioAsyncResolver::tokio(config, opts) }
    }
}

impl NameService for SystemNameService {
    async fn lookup(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        let found = self.resolver.lookup_ip(host).await.map_err(io::Error::other)?;
        Ok(found.iter().map(|ip| SocketAddr::new(ip, port)).collect())
    }
}

/// Resolve `host` to a single endpoint. Nothing is cached, so every call
/// sees the current DNS answer.
pub async fn resolve<N: NameService>(
    names: &N,
    host: &str,
    port: u16,
    family: AddressFamily,
    limit: Option<Duration>,
) -> Result<SocketAddr, ResolveError> {
    // IP literals skip the name service
    if let Some(ip) = parse_ip_literal(host) {
        return select_endpoint([SocketAddr::new(ip, port)], family).ok_or_else(|| {
            ResolveError::NoAddressFound { host: host.to_string(), family }
        });
    }

    let lookup = names.lookup(host, port);
    let found = match limit {
        Some(limit) => timeout(limit, lookup)
            .await
            .map_err(|_| ResolveError::TimedOut { host: host.to_string() })?,
        None => lookup.await,
    }
    .map_err(|source| ResolveError::Lookup { host: host.to_string(), source })?;

    select_endpoint(found, family)
        .ok_or_else(|| ResolveError::NoAddressFound { host: host.to_string(), family })
}

/// First endpoint the family admits, in resolver order.
pub fn select_endpoint(
    candidates: impl IntoIterator<Item = SocketAddr>,
    family: AddressFamily,
) -> Option<SocketAddr> {
    candidates.into_iter().find(|addr| family.admits(addr.ip()))
}

fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse().ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use trust_dns_resolver::config::NameServerConfigGroup;

    /// Canned answers keyed by host; unknown hosts fail like NXDOMAIN.
    pub(crate) struct StaticNames(pub Vec<(&'static str, Vec<IpAddr>)>);

    impl NameService for StaticNames {
        async fn lookup(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
            self.0
                .iter()
                .find(|(name, _)| *name == host)
                .map(|(_, ips)| ips.iter().map(|ip| SocketAddr::new(*ip, port)).collect())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown host"))
        }
    }

    const V4: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));
    const V6: IpAddr = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 10));

    fn names() -> StaticNames {
        StaticNames(vec![
            ("dual.test", vec![V6, V4]),
            ("v4only.test", vec![V4]),
            ("v6only.test", vec![V6]),
        ])
    }

    #[tokio::test]
    async fn any_family_takes_resolver_order() {
        let addr = resolve(&names(), "dual.test", 443, AddressFamily::Any, None).await.unwrap();
        assert_eq!(addr, SocketAddr::new(V6, 443));
    }

    #[tokio::test]
    async fn forced_family_picks_matching_record() {
        let v4 = resolve(&names(), "dual.test", 80, AddressFamily::V4, None).await.unwrap();
        assert_eq!(v4, SocketAddr::new(V4, 80));
        let v6 = resolve(&names(), "dual.test", 80, AddressFamily::V6, None).await.unwrap();
        assert_eq!(v6, SocketAddr::new(V6, 80));
    }

    #[tokio::test]
    async fn forcing_missing_family_fails() {
        let err = resolve(&names(), "v6only.test", 80, AddressFamily::V4, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoAddressFound { family: AddressFamily::V4, .. }));
        let err = resolve(&names(), "v4only.test", 80, AddressFamily::V6, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoAddressFound { family: AddressFamily::V6, .. }));
    }

    #[tokio::test]
    async fn unknown_host_is_a_lookup_error() {
        let err = resolve(&names(), "nowhere.test", 80, AddressFamily::Any, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Lookup { .. }));
    }

    #[tokio::test]
    async fn ip_literals_bypass_lookup() {
        let empty = StaticNames(vec![]);
        let addr = resolve(&empty, "127.0.0.1", 22, AddressFamily::V4, None).await.unwrap();
        assert_eq!(addr, "127.0.0.1:22".parse().unwrap());
        let addr = resolve(&empty, "[::1]", 22, AddressFamily::Any, None).await.unwrap();
        assert_eq!(addr, "[::1]:22".parse().unwrap());
        let err = resolve(&empty, "::1", 22, AddressFamily::V4, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoAddressFound { .. }));
    }

    #[tokio::test]
    async fn system_resolver_finds_localhost() {
        let names = SystemNameService::new(Some(Duration::from_secs(2)));
        let limit = Some(Duration::from_secs(2));
        let addr = resolve(&names, "localhost", 8080, AddressFamily::Any, limit).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn timed_out_lookup_leaves_nothing_running() {
        let started = std::time::Instant::now();
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let err = rt.block_on(async {
            // TEST-NET-1 never answers
            let silent = NameServerConfigGroup::from_ips_clear(&[IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))], 53, true);
            let names = SystemNameService::with_config(
                ResolverConfig::from_parts(None, vec![], silent),
                ResolverOpts::default(),
                Some(Duration::from_secs(30)),
            );
            let limit = Some(Duration::from_millis(200));
            resolve(&names, "unanswered.example.com", 80, AddressFamily::Any, limit).await.unwrap_err()
        });
        drop(rt);

        assert!(matches!(err, ResolveError::TimedOut { .. } | ResolveError::Lookup { .. }));
        assert!(started.elapsed() < Duration::from_secs(2), "runtime shutdown waited on the lookup");
    }
}
