//! # Vigil Host
//!
//! Security posture auditing for the machine running the AI client.
//!
//! Thirteen independent checks (firewall, disk encryption, Gatekeeper, SIP,
//! XProtect, secure boot, remote login, pending updates, and suspicious
//! processes / ports / login items / connections / kernel extensions) fan
//! out concurrently over an external command runner and fan back in to a
//! single [`HostSecurityReport`]. A check that fails or times out degrades
//! the report with a conservative default; it never aborts the audit.

pub mod audit;
pub mod exec;
pub mod report;

pub use audit::HostAuditor;
pub use exec::{CommandRunner, SystemRunner};
pub use report::HostSecurityReport;
