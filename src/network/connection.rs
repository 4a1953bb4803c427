//! Socket connection limits
//!
//! Caps concurrent line-socket connections globally and per client IP.
//! A slot is held by a [`ConnectionSlot`] and given back when the slot is
//! dropped, so every exit path of a connection task releases it.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::NetworkError;
use crate::config::SocketConfig;
use crate::metrics;

/// Per-connection settings for the line socket
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum total concurrent connections
    pub max_connections: usize,
    /// Maximum connections per IP address
    pub max_per_ip: usize,
    /// Close connections idle longer than this
    pub idle_timeout: Duration,
    /// Longest accepted request line in bytes
    pub max_line_length: usize,
    /// Enable TCP_NODELAY on accepted sockets
    pub tcp_nodelay: bool,
    /// Enable SO_REUSEPORT on the listener
    pub so_reuseport: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from(&SocketConfig::default())
    }
}

impl From<&SocketConfig> for ConnectionConfig {
    fn from(config: &SocketConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            max_per_ip: config.max_per_ip,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            max_line_length: config.max_line_length,
            tcp_nodelay: config.tcp_nodelay,
            so_reuseport: config.so_reuseport,
        }
    }
}

impl ConnectionConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), NetworkError> {
        let invalid = |msg: &str| Err(NetworkError::Config(msg.to_string()));
        if self.max_connections == 0 {
            return invalid("max_connections must be > 0");
        }
        if self.max_per_ip == 0 {
            return invalid("max_per_ip must be > 0");
        }
        if self.max_per_ip > self.max_connections {
            return invalid("max_per_ip cannot exceed max_connections");
        }
        if self.idle_timeout.is_zero() {
            return invalid("idle_timeout must be > 0");
        }
        if self.max_line_length == 0 {
            return invalid("max_line_length must be > 0");
        }
        Ok(())
    }
}

/// Global and per-IP connection accounting
pub struct ConnectionManager {
    max_connections: usize,
    max_per_ip: usize,
    /// Total active connections across all IPs
    total_connections: AtomicUsize,
    /// Per-IP connection counts
    per_ip_counts: DashMap<IpAddr, usize>,
}

impl ConnectionManager {
    /// Create a manager enforcing the limits in `config`
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            max_per_ip: config.max_per_ip,
            total_connections: AtomicUsize::new(0),
            per_ip_counts: DashMap::new(),
        }
    }

    /// Reserve a slot for a connection from `ip`
    ///
    /// The per-IP entry is held locked while both counters are checked and
    /// bumped, so concurrent acquires from one IP cannot overshoot.
    pub fn try_acquire(self: &Arc<Self>, ip: IpAddr) -> Result<ConnectionSlot, NetworkError> {
        let mut per_ip = self.per_ip_counts.entry(ip).or_insert(0);
        if *per_ip >= self.max_per_ip {
            return Err(NetworkError::PerIpLimit {
                ip,
                current: *per_ip,
                max: self.max_per_ip,
            });
        }

        let reserved = self.total_connections.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |n| (n < self.max_connections).then_some(n + 1),
        );
        if let Err(current) = reserved {
            drop(per_ip);
            self.per_ip_counts.remove_if(&ip, |_, count| *count == 0);
            return Err(NetworkError::ConnectionLimit {
                current,
                max: self.max_connections,
            });
        }

        *per_ip += 1;
        drop(per_ip);

        metrics::socket_connection_opened();
        Ok(ConnectionSlot {
            manager: Arc::clone(self),
            ip,
        })
    }

    fn release(&self, ip: IpAddr) {
        let _ = self
            .total_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });

        if let Some(mut count) = self.per_ip_counts.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.per_ip_counts.remove_if(&ip, |_, count| *count == 0);

        metrics::socket_connection_closed();
    }

    /// Get total active connection count
    pub fn total(&self) -> usize {
        self.total_connections.load(Ordering::Acquire)
    }

    /// Get connection count for a specific IP
    pub fn count_for_ip(&self, ip: IpAddr) -> usize {
        self.per_ip_counts.get(&ip).map(|c| *c).unwrap_or(0)
    }

    /// Number of IPs holding at least one slot
    pub fn unique_ips(&self) -> usize {
        self.per_ip_counts.len()
    }
}

/// A reserved connection slot, released on drop
pub struct ConnectionSlot {
    manager: Arc<ConnectionManager>,
    ip: IpAddr,
}

impl ConnectionSlot {
    /// Client IP holding the slot
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.manager.release(self.ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max_connections: usize, max_per_ip: usize) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(&ConnectionConfig {
            max_connections,
            max_per_ip,
            ..Default::default()
        }))
    }

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_connection_config_validation() {
        let mut config = ConnectionConfig::default();
        config.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = ConnectionConfig::default();
        config.max_per_ip = config.max_connections + 1;
        assert!(config.validate().is_err());

        let mut config = ConnectionConfig::default();
        config.max_line_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_ip_limit() {
        let manager = manager(10, 2);
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        let a = manager.try_acquire(ip).unwrap();
        let _b = manager.try_acquire(ip).unwrap();
        assert_eq!(manager.count_for_ip(ip), 2);
        assert!(matches!(
            manager.try_acquire(ip),
            Err(NetworkError::PerIpLimit { current: 2, .. })
        ));

        drop(a);
        assert_eq!(manager.count_for_ip(ip), 1);
        assert!(manager.try_acquire(ip).is_ok());
    }

    #[test]
    fn test_total_limit() {
        let manager = manager(3, 3);
        let slots: Vec<_> = (0..3)
            .map(|i| {
                let ip: IpAddr = format!("10.0.0.{}", i).parse().unwrap();
                manager.try_acquire(ip).unwrap()
            })
            .collect();
        assert_eq!(manager.total(), 3);

        let ip: IpAddr = "10.0.0.100".parse().unwrap();
        assert!(matches!(
            manager.try_acquire(ip),
            Err(NetworkError::ConnectionLimit { max: 3, .. })
        ));
        // The rejected IP must not keep an entry
        assert_eq!(manager.count_for_ip(ip), 0);
        assert_eq!(manager.unique_ips(), 3);

        drop(slots);
        assert_eq!(manager.total(), 0);
    }

    #[test]
    fn test_release_removes_idle_entries() {
        let manager = manager(10, 5);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        let slot = manager.try_acquire(ip).unwrap();
        assert_eq!(slot.ip(), ip);
        assert_eq!(manager.unique_ips(), 1);

        drop(slot);
        assert_eq!(manager.total(), 0);
        assert_eq!(manager.unique_ips(), 0);
    }
}
