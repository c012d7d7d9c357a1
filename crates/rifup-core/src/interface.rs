//! Interface records and their configuration variables.

use std::fmt;
use std::net::IpAddr;

/// An address with an optional CIDR prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    /// The address itself (v4 or v6).
    pub addr: IpAddr,
    /// Prefix length, when one was given or derived from a netmask.
    pub prefix: Option<u8>,
}

impl Address {
    /// Parses CIDR-style text (`192.0.2.1/24`, `2001:db8::1/64`, or a
    /// bare address). Returns `None` for malformed input or an
    /// out-of-range prefix.
    pub fn parse(s: &str) -> Option<Self> {
        let (addr_part, prefix) = match s.rsplit_once('/') {
            Some((a, p)) => (a, Some(p.parse::<u8>().ok()?)),
            None => (s, None),
        };
        let addr: IpAddr = addr_part.parse().ok()?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if let Some(p) = prefix {
            if p > max {
                return None;
            }
        }
        Some(Self { addr, prefix })
    }

    /// Derives a prefix length from a `netmask` value: either a plain
    /// CIDR length or a dotted-quad mask whose set bits are counted.
    pub fn prefix_from_netmask(s: &str) -> Option<u8> {
        if !s.contains('.') {
            return s.parse::<u8>().ok().filter(|n| *n <= 128);
        }
        let mask: std::net::Ipv4Addr = s.parse().ok()?;
        Some(u32::from(mask).count_ones() as u8)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(p) => write!(f, "{}/{}", self.addr, p),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// Insertion-ordered multivalued variable set.
///
/// The same key may repeat (multiple `address` entries, multiple `use`
/// executors); order of appearance is preserved.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    entries: Vec<(String, String)>,
}

impl Vars {
    /// Creates an empty variable set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key/value pair, keeping any existing entries.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Appends a pair unless an identical one is already present.
    pub fn push_unique(&mut self, key: &str, value: &str) {
        if !self.entries.iter().any(|(k, v)| k == key && v == value) {
            self.push(key, value);
        }
    }

    /// First value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in order of appearance.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether any entry exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Replaces every entry for `key` with a single value.
    pub fn set_single(&mut self, key: &str, value: impl Into<String>) {
        self.entries.retain(|(k, _)| k != key);
        self.push(key, value);
    }

    /// Iterates all `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One named network interface (or configuration stanza).
#[derive(Debug, Clone)]
pub struct Interface {
    /// The interface name, unique within a collection.
    pub ifname: String,

    /// Configuration variables in order of appearance.
    pub vars: Vars,

    /// Listed in an `auto` directive.
    pub is_auto: bool,
    /// Bridges mirror their ports into `IF_BRIDGE_PORTS`.
    pub is_bridge: bool,
    /// Bonds mirror their members into `IF_BOND_SLAVES`.
    pub is_bond: bool,
    /// Usable only as an inheritance source, never transitioned.
    pub is_template: bool,
    /// Brought up by explicit request; survives parent teardown.
    pub is_explicit: bool,
    /// Stanza content was malformed; skipped at transition time
    /// unless forced.
    pub has_config_error: bool,
    /// Transient recursion guard. Must be false on entry to and exit
    /// from every recursive traversal.
    pub is_pending: bool,

    /// Active references: self when up, plus one per dependent parent.
    /// Zero when fully down.
    pub refcount: u32,

    /// Computed dependency depth (hops below the deepest reachable
    /// leaf of the `requires` chain).
    pub rdepends_count: u32,
}

impl Interface {
    /// Creates a bare record with no variables and all flags clear.
    pub fn new(ifname: impl Into<String>) -> Self {
        Self {
            ifname: ifname.into(),
            vars: Vars::new(),
            is_auto: false,
            is_bridge: false,
            is_bond: false,
            is_template: false,
            is_explicit: false,
            has_config_error: false,
            is_pending: false,
            refcount: 0,
            rdepends_count: 0,
        }
    }

    /// Executor names from `use` variables, in declaration order.
    pub fn executors(&self) -> impl Iterator<Item = &str> {
        self.vars.get_all("use")
    }

    /// All required interface names across every `requires` entry,
    /// de-duplicated, first appearance wins.
    pub fn requires(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for value in self.vars.get_all("requires") {
            for token in value.split_whitespace() {
                if !out.iter().any(|t| t == token) {
                    out.push(token.to_string());
                }
            }
        }
        out
    }

    /// Parsed `address` variables; entries without a prefix pick one
    /// up from a `netmask` variable when present.
    pub fn addresses(&self) -> Vec<Address> {
        let fallback = self
            .vars
            .get("netmask")
            .and_then(Address::prefix_from_netmask);
        self.vars
            .get_all("address")
            .filter_map(Address::parse)
            .map(|mut a| {
                if a.prefix.is_none() {
                    a.prefix = fallback;
                }
                a
            })
            .collect()
    }

    /// `gateway` values in order of appearance.
    pub fn gateways(&self) -> Vec<&str> {
        self.vars.get_all("gateway").collect()
    }

    /// The configuration method exported as `METHOD`, derived from the
    /// executor list.
    pub fn method(&self) -> &'static str {
        for executor in self.executors() {
            match executor {
                "loopback" => return "loopback",
                "dhcp" => return "dhcp",
                "static" => return "static",
                "ppp" => return "ppp",
                _ => {}
            }
        }
        "manual"
    }
}
