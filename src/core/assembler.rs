//! Context assembly
//!
//! Builds the ordered layers handed to the formatter for one log call:
//! global static facts, call-site facts, per-call dynamic facts and the
//! caller's session overlay, in that order.

use super::call_site::CallSiteCache;
use super::context::Context;
use super::session::Session;
use super::timestamp::TimestampFormat;
use arc_swap::ArcSwap;
use std::fmt;
use std::net::{IpAddr, UdpSocket};
use std::sync::{Arc, OnceLock};

/// Process-wide facts (`ip`, `hostname`), computed on first use
pub fn global_static_context() -> Arc<Context> {
    static GLOBAL: OnceLock<Arc<Context>> = OnceLock::new();
    Arc::clone(GLOBAL.get_or_init(|| {
        Arc::new(
            Context::new()
                .with_field("ip", local_ipv4().unwrap_or_default())
                .with_field("hostname", gethostname::gethostname().to_string_lossy().into_owned()),
        )
    }))
}

/// First non-loopback IPv4 address the routing table would use
///
/// Connecting a UDP socket only selects a route; nothing is sent.
fn local_ipv4() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip.to_string()),
        _ => None,
    }
}

/// Escape line breaks and tabs so one call yields one line
fn escape_controls(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Ordered context layers for a single log call
#[derive(Debug)]
pub struct ContextStack<'a> {
    global: Arc<Context>,
    call_site: Arc<Context>,
    dynamic: Context,
    session: Option<&'a Context>,
}

impl<'a> ContextStack<'a> {
    /// Layers in precedence order, lowest first
    pub fn layers(&self) -> Vec<&Context> {
        let mut layers = Vec::with_capacity(4);
        layers.push(self.global.as_ref());
        layers.push(self.call_site.as_ref());
        layers.push(&self.dynamic);
        if let Some(session) = self.session {
            layers.push(session);
        }
        layers
    }

    pub fn dynamic(&self) -> &Context {
        &self.dynamic
    }

    pub fn call_site(&self) -> &Context {
        &self.call_site
    }
}

/// Merges the four context sources for each log call
#[derive(Debug)]
pub struct ContextAssembler {
    global: Arc<Context>,
    call_sites: CallSiteCache,
    time_format: ArcSwap<TimestampFormat>,
    escape_line_breaks: bool,
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::with_parts(
            global_static_context(),
            CallSiteCache::new(),
            TimestampFormat::default(),
        )
    }

    pub fn with_parts(
        global: Arc<Context>,
        call_sites: CallSiteCache,
        time_format: TimestampFormat,
    ) -> Self {
        Self {
            global,
            call_sites,
            time_format: ArcSwap::from_pointee(time_format),
            escape_line_breaks: false,
        }
    }

    /// Escape `\n`, `\r` and `\t` in messages; off by default
    #[must_use = "builder methods return a new value"]
    pub fn escape_line_breaks(mut self, enabled: bool) -> Self {
        self.escape_line_breaks = enabled;
        self
    }

    /// Gather the layers for a call made `skip` frames above our caller
    #[inline(never)]
    pub fn assemble<'a>(
        &self,
        skip: usize,
        level: &str,
        message: fmt::Arguments<'_>,
        session: Option<&'a Session>,
    ) -> ContextStack<'a> {
        let call_site = self.call_sites.resolve(skip + 1);
        let rendered = match message.as_str() {
            Some(text) => text.to_string(),
            None => message.to_string(),
        };
        let rendered = if self.escape_line_breaks {
            escape_controls(&rendered)
        } else {
            rendered
        };
        let dynamic = Context::new()
            .with_field("level", level)
            .with_field("time", self.time_format.load().now())
            .with_field("message", rendered);

        ContextStack {
            global: Arc::clone(&self.global),
            call_site,
            dynamic,
            session: session.map(Session::context),
        }
    }

    pub fn set_time_format(&self, format: TimestampFormat) {
        self.time_format.store(Arc::new(format));
    }

    pub fn time_format(&self) -> TimestampFormat {
        self.time_format.load().as_ref().clone()
    }

    pub fn call_sites(&self) -> &CallSiteCache {
        &self.call_sites
    }

    pub fn global(&self) -> &Context {
        &self.global
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}
