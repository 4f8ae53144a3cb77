//! FortiGate CLI configuration analysis.
//!
//! Reads a `show full-configuration` style export into a typed model, then
//! answers questions about it: which objects a policy actually reaches, what a
//! policy expands to, how a given flow would be routed, filtered and
//! translated, and what changed between two exports.
//!
//! # Architecture
//!
//! ## Reading
//!
//! - [`parse`] — Drives `conftree-core`'s block reader over an export, tracks
//!   `config global` / `config vdom` scoping and collects recovery warnings
//! - [`sections`] — Registry mapping section names (and their aliases) to
//!   typed handlers; anything unclaimed is kept verbatim
//! - [`aliases`] — Built-in and user-supplied section name aliases
//! - [`model`] — Typed objects per scope plus the VDOM-aware [`model::Configuration`]
//!
//! ## Questions
//!
//! - [`resolve`] — Address and service resolution through groups, and policy
//!   expansion
//! - [`analyze`] — Used/unused objects, group depth and membership cycles
//! - [`audit`] — Dangling references and broken groups as findings
//! - [`trace`] — Hop-by-hop simulation of one flow
//! - [`compare`] — Section-level diff of two exports
//!
//! ## Output
//!
//! - [`parse_report`] — What a parse produced
//! - [`report`] — Colored terminal rendering
//! - [`settings`] — Tool settings (reader strategy, hop budget, exclusions)
//!
//! # Examples
//!
//! ```ignore
//! use fortitrace::parse::parse;
//! use fortitrace::trace::{trace, TraceRequest};
//!
//! let (config, warnings) = parse(&std::fs::read_to_string("fw.conf")?);
//! let model = config.view(None)?;
//! let request = TraceRequest::parse("192.168.1.10", "192.168.1.20", "tcp", Some("443"))?;
//! println!("{}", trace(&model, &request).status);
//! ```

pub mod aliases;
pub mod analyze;
pub mod audit;
pub mod compare;
pub mod model;
pub mod parse;
pub mod parse_report;
pub mod report;
pub mod resolve;
pub mod sections;
pub mod settings;
pub mod trace;
