//! Command risk classification
//!
//! Pure substring tables, matched case-insensitively. High-risk commands are refused
//! when a session runs in safe mode (`risk_level = low`).

use crate::types::RiskLevel;

const HIGH_RISK_PATTERNS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r ",
    "rm --recursive",
    "mkfs",
    "fdisk",
    "dd if=",
    "format c:",
    "> /dev/sd",
    "shred ",
    "wipefs",
    "shutdown",
    "reboot",
    "halt",
    "poweroff",
    "init 0",
    "init 6",
    ":(){",
    "chmod -r 777 /",
    "del /f",
    "del /s",
    "rd /s",
    "rmdir /s",
    "drop database",
    "drop table",
];

const MEDIUM_RISK_PATTERNS: &[&str] = &[
    "systemctl stop",
    "systemctl disable",
    "systemctl restart",
    "systemctl mask",
    "service ",
    "net stop",
    "sc stop",
    "kill ",
    "killall",
    "pkill",
    "taskkill",
    "iptables",
    "ip6tables",
    "nft ",
    "ufw ",
    "firewall-cmd",
    "netsh advfirewall",
    "chmod ",
    "chown ",
];

pub fn classify(command: &str) -> RiskLevel {
    let normalized = command.to_lowercase();

    if HIGH_RISK_PATTERNS.iter().any(|p| normalized.contains(p)) {
        RiskLevel::High
    } else if MEDIUM_RISK_PATTERNS.iter().any(|p| normalized.contains(p)) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Whether a session at `session_level` refuses a command of `command_level`
pub fn is_blocked(session_level: RiskLevel, command_level: RiskLevel) -> bool {
    session_level == RiskLevel::Low && command_level == RiskLevel::High
}
