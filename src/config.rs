//! Server blocks, per-zone configuration, and process-wide options.

/// Port used when a key does not name one.
pub const DEFAULT_PORT: &str = "2053";

/// Port value that asks for the socket-activated listener instead of binding.
pub const ACTIVATION_SENTINEL: &str = "sa";

/// Process-wide defaults applied while building a topology.
///
/// # Example
///
/// ```
/// use dns_topology::Options;
///
/// let options = Options::default().with_default_port("5353").with_quiet(true);
///
/// assert_eq!(options.default_port, "5353");
/// assert_eq!(options.activation_sentinel, "sa");
/// assert!(options.quiet);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Port assigned to configurations whose key had none.
    pub default_port: String,

    /// Port value requesting the socket-activated port.
    pub activation_sentinel: String,

    /// Suppress the startup summary at info level.
    pub quiet: bool,
}

impl Options {
    /// Reads overrides from `DNS_PORT` and `DNS_QUIET`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(port) = std::env::var("DNS_PORT") {
            if !port.trim().is_empty() {
                options.default_port = port.trim().to_string();
            }
        }
        options.quiet = std::env::var("DNS_QUIET")
            .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        options
    }

    /// Overrides the default port.
    #[must_use]
    pub fn with_default_port(mut self, port: impl Into<String>) -> Self {
        self.default_port = port.into();
        self
    }

    /// Overrides the socket-activation sentinel.
    #[must_use]
    pub fn with_activation_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.activation_sentinel = sentinel.into();
        self
    }

    /// Sets quiet mode.
    #[must_use]
    pub const fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT.to_string(),
            activation_sentinel: ACTIVATION_SENTINEL.to_string(),
            quiet: false,
        }
    }
}

/// One middleware declaration inside a server block, e.g. `whoami` or `log stdout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Directive name.
    pub name: String,

    /// Arguments in the order written.
    pub args: Vec<String>,
}

impl Directive {
    /// Creates a directive.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// A parsed block: the zone keys it serves and the middleware applied to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerBlock {
    /// Raw keys; rewritten to canonical form by inspection.
    pub keys: Vec<String>,

    /// Middleware declarations, in order.
    pub directives: Vec<Directive>,
}

impl ServerBlock {
    /// Creates a block with no directives.
    #[must_use]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            directives: Vec::new(),
        }
    }

    /// Appends a directive.
    #[must_use]
    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// The block served when no configuration input exists: the root zone on
    /// `port`, answered by `whoami`.
    #[must_use]
    pub fn default_input(port: &str) -> Self {
        Self::new([format!(".:{port}")])
            .with_directive(Directive::new("whoami", Vec::<String>::new()))
    }
}

/// Configuration for one served zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneConfig {
    /// Canonical zone name.
    pub zone: String,

    /// Host to bind; empty means all interfaces.
    pub listen_host: String,

    /// Port to bind; empty until defaulted.
    pub port: String,

    /// Middleware chain, in declaration order.
    pub middleware: Vec<Directive>,

    pub(crate) socket_activated: bool,
}

impl ZoneConfig {
    /// Creates a configuration with no middleware, listening on all interfaces.
    #[must_use]
    pub fn new(zone: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            listen_host: String::new(),
            port: port.into(),
            middleware: Vec::new(),
            socket_activated: false,
        }
    }

    /// Appends a middleware to the chain.
    pub fn add_middleware(&mut self, middleware: Directive) {
        self.middleware.push(middleware);
    }

    /// Sets the bind host.
    pub fn set_listen_host(&mut self, host: impl Into<String>) {
        self.listen_host = host.into();
    }

    /// Returns `true` once grouping has swapped in the inherited listener's port.
    #[must_use]
    pub const fn is_socket_activated(&self) -> bool {
        self.socket_activated
    }
}
