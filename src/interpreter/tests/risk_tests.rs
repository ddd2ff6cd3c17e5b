//! Tests for command risk classification

use crate::interpreter::risk::{classify, is_blocked};
use crate::types::RiskLevel;

#[test]
fn test_destructive_commands_are_high_risk() {
    for command in [
        "rm -rf /tmp/x",
        "sudo mkfs.ext4 /dev/sdb1",
        "dd if=/dev/zero of=/dev/sda",
        "shutdown -h now",
        "FORMAT C: /q",
    ] {
        assert_eq!(classify(command), RiskLevel::High, "{}", command);
    }
}

#[test]
fn test_service_and_permission_changes_are_medium_risk() {
    for command in [
        "systemctl restart nginx",
        "kill -9 1234",
        "iptables -A INPUT -j DROP",
        "chmod 600 key.pem",
    ] {
        assert_eq!(classify(command), RiskLevel::Medium, "{}", command);
    }
}

#[test]
fn test_everything_else_is_low_risk() {
    for command in ["echo hi", "ls -la", "df -h", "cat /etc/hosts", ""] {
        assert_eq!(classify(command), RiskLevel::Low, "{}", command);
    }
}

#[test]
fn test_only_safe_mode_blocks_and_only_high_risk() {
    assert!(is_blocked(RiskLevel::Low, RiskLevel::High));
    assert!(!is_blocked(RiskLevel::Low, RiskLevel::Medium));
    assert!(!is_blocked(RiskLevel::Low, RiskLevel::Low));
    assert!(!is_blocked(RiskLevel::Medium, RiskLevel::High));
    assert!(!is_blocked(RiskLevel::High, RiskLevel::High));
}
