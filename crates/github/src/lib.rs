//! GitHub REST adapter for the issue reference graph.
//!
//! Implements [`graph::IssueSource`] on top of three REST endpoints:
//!
//! | Endpoint | Used for |
//! |----------|----------|
//! | `repos/{owner}/{repo}/issues/{n}` | issue body |
//! | `repos/{owner}/{repo}/issues/{n}/comments` | comment bodies and authors |
//! | `repos/{owner}/{repo}/issues/{n}/timeline` | linking events (`cross-referenced`, `connected`, ...) |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** No traversal rules live here. The `traversal` crate
//! only ever sees [`graph::IssueSource`]; HTTP status codes, pagination and
//! retries stay behind that seam.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`transport`] | [`RestTransport`] seam, reqwest-backed [`HttpTransport`], [`Retrying`] decorator |
//! | [`wire`] | Serde payload types and their conversion into domain types |
//! | [`source`] | [`GitHubIssueSource`], pagination |

pub mod source;
pub mod transport;
pub mod wire;

pub use source::{GitHubIssueSource, PER_PAGE};
pub use transport::{
    HttpTransport, RestTransport, RetrySchedule, Retrying, DEFAULT_API_URL, GITHUB_ACCEPT,
};
