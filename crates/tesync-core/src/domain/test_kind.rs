//! Supported ThousandEyes test kinds and their Terraform resource types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A monitor kind, as named by the ThousandEyes API (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    AgentToServer,
    AgentToAgent,
    Bgp,
    DnsServer,
    DnsTrace,
    Dnssec,
    HttpServer,
    PageLoad,
    WebTransactions,
    Api,
    FtpServer,
    SipServer,
    Voice,
}

impl TestKind {
    pub const ALL: [TestKind; 13] = [
        TestKind::AgentToServer,
        TestKind::AgentToAgent,
        TestKind::Bgp,
        TestKind::DnsServer,
        TestKind::DnsTrace,
        TestKind::Dnssec,
        TestKind::HttpServer,
        TestKind::PageLoad,
        TestKind::WebTransactions,
        TestKind::Api,
        TestKind::FtpServer,
        TestKind::SipServer,
        TestKind::Voice,
    ];

    /// Wire name used by the API and by desired-state records.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::AgentToServer => "agent-to-server",
            TestKind::AgentToAgent => "agent-to-agent",
            TestKind::Bgp => "bgp",
            TestKind::DnsServer => "dns-server",
            TestKind::DnsTrace => "dns-trace",
            TestKind::Dnssec => "dnssec",
            TestKind::HttpServer => "http-server",
            TestKind::PageLoad => "page-load",
            TestKind::WebTransactions => "web-transactions",
            TestKind::Api => "api",
            TestKind::FtpServer => "ftp-server",
            TestKind::SipServer => "sip-server",
            TestKind::Voice => "voice",
        }
    }

    /// Terraform resource type in the `thousandeyes` provider.
    pub fn resource_kind(&self) -> &'static str {
        match self {
            TestKind::AgentToServer => "thousandeyes_agent_to_server",
            TestKind::AgentToAgent => "thousandeyes_agent_to_agent",
            TestKind::Bgp => "thousandeyes_bgp",
            TestKind::DnsServer => "thousandeyes_dns_server",
            TestKind::DnsTrace => "thousandeyes_dns_trace",
            TestKind::Dnssec => "thousandeyes_dnssec",
            TestKind::HttpServer => "thousandeyes_http_server",
            TestKind::PageLoad => "thousandeyes_page_load",
            TestKind::WebTransactions => "thousandeyes_web_transaction",
            TestKind::Api => "thousandeyes_api",
            TestKind::FtpServer => "thousandeyes_ftp_server",
            TestKind::SipServer => "thousandeyes_sip_server",
            TestKind::Voice => "thousandeyes_voice",
        }
    }

    /// BGP tests are monitored from public BGP collectors, never from agents.
    pub fn carries_agents(&self) -> bool {
        !matches!(self, TestKind::Bgp)
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownTestType(s.to_string()))
    }
}
