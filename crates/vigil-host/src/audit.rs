//! Host security auditor
//!
//! Thirteen independent posture checks issued concurrently, each wrapping
//! one external command. Per-check timeout budgets differ because the
//! underlying utilities have very different latency profiles (process
//! listings come back in milliseconds; `softwareupdate -l` can take close
//! to a minute). A failed check returns its conservative default.
//!
//! Suspicious-entity detection is heuristic: small denylists of known
//! attacker tooling, backdoor ports, and malicious hosting prefixes, plus
//! substring checks on names. Not exhaustive.

use crate::exec::CommandRunner;
use crate::report::HostSecurityReport;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Known attack-tool process names (exact match on the binary name)
const PROCESS_DENYLIST: &[&str] = &[
    "ncat",
    "netcat",
    "socat",
    "mimikatz",
    "meterpreter",
    "empire",
    "sliver",
    "chisel",
    "responder",
    "bettercap",
];

/// Name substrings that warrant flagging a process or login item
const NAME_HEURISTICS: &[&str] = &["keylog", "backdoor", "rootkit", "rat_", "stealer"];

/// Ports historically used by backdoors and reverse shells
const BACKDOOR_PORTS: &[u16] = &[1337, 4444, 5555, 6666, 12345, 31337, 54321];

/// Address prefixes of known malicious hosting ranges
const MALICIOUS_IP_PREFIXES: &[&str] = &["185.220.", "45.155.", "194.180.", "91.240."];

const FAST_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const HARDWARE_TIMEOUT: Duration = Duration::from_secs(15);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs the audit cycle over an external command runner
pub struct HostAuditor {
    runner: Arc<dyn CommandRunner>,
}

impl HostAuditor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Run all thirteen checks concurrently and aggregate the results.
    /// Always returns a report; total collaborator failure yields the
    /// degraded everything-off snapshot.
    pub async fn audit(&self) -> HostSecurityReport {
        let (
            firewall,
            disk,
            gatekeeper,
            sip,
            xprotect,
            secure_boot,
            remote_login,
            updates,
            processes,
            ports,
            login_items,
            connections,
            kexts,
        ) = tokio::join!(
            self.check_firewall(),
            self.check_disk_encryption(),
            self.check_gatekeeper(),
            self.check_sip(),
            self.check_xprotect_version(),
            self.check_secure_boot(),
            self.check_remote_login(),
            self.check_pending_updates(),
            self.check_processes(),
            self.check_ports(),
            self.check_login_items(),
            self.check_connections(),
            self.check_kernel_extensions(),
        );

        HostSecurityReport {
            timestamp: Utc::now(),
            firewall_enabled: firewall,
            disk_encrypted: disk,
            gatekeeper_enabled: gatekeeper,
            system_integrity_protection: sip,
            xprotect_version: xprotect,
            secure_boot_enabled: secure_boot,
            remote_login_enabled: remote_login,
            software_updates_pending: updates,
            suspicious_processes: processes,
            suspicious_open_ports: ports,
            suspicious_login_items: login_items,
            suspicious_connections: connections,
            suspicious_kernel_extensions: kexts,
            overall_threat_level: vigil_core::ThreatLevel::Normal,
            recommendations: Vec::new(),
        }
        .finalize()
    }

    async fn check_firewall(&self) -> bool {
        self.runner
            .run(
                "/usr/libexec/ApplicationFirewall/socketfilterfw",
                &["--getglobalstate"],
                PROBE_TIMEOUT,
            )
            .await
            .map(|out| out.to_lowercase().contains("enabled"))
            .unwrap_or(false)
    }

    async fn check_disk_encryption(&self) -> bool {
        self.runner
            .run("fdesetup", &["status"], PROBE_TIMEOUT)
            .await
            .map(|out| out.contains("FileVault is On"))
            .unwrap_or(false)
    }

    async fn check_gatekeeper(&self) -> bool {
        self.runner
            .run("spctl", &["--status"], PROBE_TIMEOUT)
            .await
            .map(|out| out.contains("assessments enabled"))
            .unwrap_or(false)
    }

    async fn check_sip(&self) -> bool {
        self.runner
            .run("csrutil", &["status"], PROBE_TIMEOUT)
            .await
            .map(|out| out.to_lowercase().contains("enabled"))
            .unwrap_or(false)
    }

    async fn check_xprotect_version(&self) -> Option<String> {
        self.runner
            .run(
                "defaults",
                &[
                    "read",
                    "/Library/Apple/System/Library/CoreServices/XProtect.bundle/Contents/Info",
                    "CFBundleShortVersionString",
                ],
                PROBE_TIMEOUT,
            )
            .await
            .map(|out| out.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// None when the hardware has no secure boot support at all.
    async fn check_secure_boot(&self) -> Option<bool> {
        let out = self
            .runner
            .run("system_profiler", &["SPiBridgeDataType"], HARDWARE_TIMEOUT)
            .await?;
        if !out.contains("Secure Boot") {
            return None;
        }
        Some(out.contains("Full Security"))
    }

    async fn check_remote_login(&self) -> bool {
        self.runner
            .run("systemsetup", &["-getremotelogin"], PROBE_TIMEOUT)
            .await
            .map(|out| out.contains("Remote Login: On"))
            .unwrap_or(false)
    }

    async fn check_pending_updates(&self) -> u32 {
        self.runner
            .run("softwareupdate", &["-l"], UPDATE_TIMEOUT)
            .await
            .map(|out| {
                out.lines()
                    .filter(|line| line.trim_start().starts_with("* Label:"))
                    .count() as u32
            })
            .unwrap_or(0)
    }

    async fn check_processes(&self) -> Vec<String> {
        let Some(out) = self.runner.run("ps", &["axo", "comm"], FAST_TIMEOUT).await else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for line in out.lines().skip(1) {
            let name = line
                .trim()
                .rsplit('/')
                .next()
                .unwrap_or(line.trim())
                .to_lowercase();
            if name.is_empty() {
                continue;
            }
            if PROCESS_DENYLIST.contains(&name.as_str())
                || NAME_HEURISTICS.iter().any(|h| name.contains(h))
            {
                found.push(line.trim().to_string());
            }
        }
        found
    }

    async fn check_ports(&self) -> Vec<String> {
        let Some(out) = self
            .runner
            .run("lsof", &["-iTCP", "-sTCP:LISTEN", "-P", "-n"], FAST_TIMEOUT)
            .await
        else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for line in out.lines().skip(1) {
            if let Some(port) = listen_port(line) {
                if BACKDOOR_PORTS.contains(&port) {
                    found.push(format!("{port}"));
                }
            }
        }
        found.sort();
        found.dedup();
        found
    }

    async fn check_login_items(&self) -> Vec<String> {
        let Some(out) = self
            .runner
            .run(
                "osascript",
                &[
                    "-e",
                    "tell application \"System Events\" to get the name of every login item",
                ],
                PROBE_TIMEOUT,
            )
            .await
        else {
            return Vec::new();
        };
        out.trim()
            .split(", ")
            .filter(|name| {
                let lower = name.to_lowercase();
                !lower.is_empty() && NAME_HEURISTICS.iter().any(|h| lower.contains(h))
            })
            .map(|name| name.to_string())
            .collect()
    }

    async fn check_connections(&self) -> Vec<String> {
        let Some(out) = self.runner.run("netstat", &["-an", "-p", "tcp"], PROBE_TIMEOUT).await
        else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for line in out.lines() {
            if !line.contains("ESTABLISHED") {
                continue;
            }
            let Some(remote) = line.split_whitespace().nth(4) else {
                continue;
            };
            let flagged_ip = MALICIOUS_IP_PREFIXES.iter().any(|p| remote.starts_with(p));
            let flagged_port = remote
                .rsplit(['.', ':'])
                .next()
                .and_then(|p| p.parse::<u16>().ok())
                .map(|p| BACKDOOR_PORTS.contains(&p))
                .unwrap_or(false);
            if flagged_ip || flagged_port {
                found.push(remote.to_string());
            }
        }
        found
    }

    async fn check_kernel_extensions(&self) -> Vec<String> {
        let Some(out) = self.runner.run("kextstat", &["-l"], PROBE_TIMEOUT).await else {
            return Vec::new();
        };
        out.lines()
            .filter_map(|line| {
                line.split_whitespace()
                    .find(|tok| tok.contains('.') && !tok.starts_with('('))
            })
            .filter(|bundle| {
                let lower = bundle.to_lowercase();
                !lower.starts_with("com.apple.")
                    && (NAME_HEURISTICS.iter().any(|h| lower.contains(h))
                        || lower.contains("inject")
                        || lower.contains("hook"))
            })
            .map(|bundle| bundle.to_string())
            .collect()
    }
}

/// Extract the listening port from one lsof line, e.g. `*:4444 (LISTEN)`.
fn listen_port(line: &str) -> Option<u16> {
    let name = line.split_whitespace().nth(8)?;
    name.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use vigil_core::ThreatLevel;

    /// Canned runner keyed by program name. Anything unlisted fails.
    struct CannedRunner {
        outputs: HashMap<&'static str, String>,
    }

    impl CannedRunner {
        fn new() -> Self {
            Self {
                outputs: HashMap::new(),
            }
        }

        fn with(mut self, program: &'static str, output: &str) -> Self {
            self.outputs.insert(program, output.to_string());
            self
        }
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(&self, program: &str, _args: &[&str], _timeout: Duration) -> Option<String> {
            let key = program.rsplit('/').next().unwrap_or(program);
            self.outputs.get(key).cloned()
        }
    }

    fn healthy_runner() -> CannedRunner {
        CannedRunner::new()
            .with("socketfilterfw", "Firewall is enabled. (State = 1)")
            .with("fdesetup", "FileVault is On.")
            .with("spctl", "assessments enabled")
            .with("csrutil", "System Integrity Protection status: enabled.")
            .with("defaults", "5287\n")
            .with(
                "system_profiler",
                "Controller Information:\n  Secure Boot: Full Security\n",
            )
            .with("systemsetup", "Remote Login: Off")
            .with("softwareupdate", "No new software available.")
            .with("ps", "COMM\n/usr/sbin/syslogd\n/usr/libexec/secd\n")
            .with("lsof", "COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME\n")
            .with("osascript", "Music, Docker")
            .with("netstat", "Active Internet connections\n")
            .with("kextstat", "Index Refs Size Name\n  1  100 0x1000 com.apple.kpi.bsd\n")
    }

    #[tokio::test]
    async fn test_healthy_host_audit() {
        let auditor = HostAuditor::new(Arc::new(healthy_runner()));
        let report = auditor.audit().await;
        assert!(report.firewall_enabled);
        assert!(report.disk_encrypted);
        assert!(report.system_integrity_protection);
        assert_eq!(report.secure_boot_enabled, Some(true));
        assert_eq!(report.overall_threat_level, ThreatLevel::Normal);
    }

    #[tokio::test]
    async fn test_sip_disabled_aggregates_critical() {
        let runner = healthy_runner().with(
            "csrutil",
            "System Integrity Protection status: disabled.",
        );
        let auditor = HostAuditor::new(Arc::new(runner));
        let report = auditor.audit().await;
        assert!(!report.system_integrity_protection);
        assert_eq!(report.overall_threat_level, ThreatLevel::Critical);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("System Integrity Protection")));
    }

    #[tokio::test]
    async fn test_total_failure_degrades_not_panics() {
        let auditor = HostAuditor::new(Arc::new(CannedRunner::new()));
        let report = auditor.audit().await;
        // Conservative defaults: everything off, lists empty.
        assert!(!report.firewall_enabled);
        assert!(report.suspicious_processes.is_empty());
        assert_eq!(report.secure_boot_enabled, None);
        assert_eq!(report.software_updates_pending, 0);
    }

    #[tokio::test]
    async fn test_denylisted_process_flagged() {
        let runner = healthy_runner().with("ps", "COMM\n/usr/sbin/syslogd\n/tmp/ncat\n");
        let auditor = HostAuditor::new(Arc::new(runner));
        let report = auditor.audit().await;
        assert_eq!(report.suspicious_processes, vec!["/tmp/ncat".to_string()]);
        assert_eq!(report.overall_threat_level, ThreatLevel::High);
    }

    #[tokio::test]
    async fn test_backdoor_port_flagged() {
        let runner = healthy_runner().with(
            "lsof",
            "COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME\n\
             evil 666 root 3u IPv4 0x0 0t0 TCP *:31337 (LISTEN)\n\
             safe 123 root 3u IPv4 0x0 0t0 TCP *:8080 (LISTEN)\n",
        );
        let auditor = HostAuditor::new(Arc::new(runner));
        let report = auditor.audit().await;
        assert_eq!(report.suspicious_open_ports, vec!["31337".to_string()]);
    }

    #[tokio::test]
    async fn test_malicious_connection_flagged() {
        let runner = healthy_runner().with(
            "netstat",
            "Active Internet connections\n\
             tcp4 0 0 10.0.0.5.52344 185.220.101.4.443 ESTABLISHED\n\
             tcp4 0 0 10.0.0.5.52345 140.82.112.3.443 ESTABLISHED\n",
        );
        let auditor = HostAuditor::new(Arc::new(runner));
        let report = auditor.audit().await;
        assert_eq!(report.suspicious_connections.len(), 1);
        assert!(report.suspicious_connections[0].starts_with("185.220."));
    }

    #[tokio::test]
    async fn test_non_apple_kext_flagged() {
        let runner = healthy_runner().with(
            "kextstat",
            "Index Refs Size Name\n\
             1 100 0x1000 com.apple.kpi.bsd\n\
             2 0 0x2000 com.shady.keylogger\n",
        );
        let auditor = HostAuditor::new(Arc::new(runner));
        let report = auditor.audit().await;
        assert_eq!(
            report.suspicious_kernel_extensions,
            vec!["com.shady.keylogger".to_string()]
        );
        assert_eq!(report.overall_threat_level, ThreatLevel::Critical);
    }

    #[tokio::test]
    async fn test_pending_updates_counted() {
        let runner = healthy_runner().with(
            "softwareupdate",
            "Software Update found the following new or updated software:\n\
             * Label: macOS Sequoia 15.1\n\
             * Label: Safari 18.1\n",
        );
        let auditor = HostAuditor::new(Arc::new(runner));
        let report = auditor.audit().await;
        assert_eq!(report.software_updates_pending, 2);
        assert_eq!(report.overall_threat_level, ThreatLevel::Elevated);
    }
}
