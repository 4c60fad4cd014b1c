use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// DNS-SD service type browsed for AV receivers.
pub const SERVICE_TYPE: &str = "_http._tcp.local.";

/// Receivers only answer their control API on the default HTTP port.
pub const RECEIVER_PORT: u16 = 80;

/// How often a discovery session re-evaluates its completion condition.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// A service advertisement that may turn out to be a supported device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Advertised instance name, used as the display name.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub ips: Vec<IpAddr>,
}

impl Candidate {
    /// Host to contact: first usable IP, else the advertised host name.
    pub fn address(&self) -> String {
        match self.ips.first() {
            Some(ip) => ip.to_string(),
            None => self.host.trim_end_matches('.').to_string(),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.address(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(ips: Vec<IpAddr>) -> Candidate {
        Candidate {
            name: "Living Room".into(),
            host: "rx-v675.local.".into(),
            port: 80,
            ips,
        }
    }

    #[test]
    fn address_prefers_ip() {
        let c = candidate(vec!["192.168.1.20".parse().unwrap()]);
        assert_eq!(c.address(), "192.168.1.20");
        assert_eq!(c.to_string(), "Living Room (192.168.1.20:80)");
    }

    #[test]
    fn address_falls_back_to_host() {
        assert_eq!(candidate(vec![]).address(), "rx-v675.local");
    }
}
