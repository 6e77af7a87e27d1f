// Linux-specific helpers: /sys/class/net counters, default route from /proc.

/// Read cumulative (rx_bytes, tx_bytes) from /sys/class/net/<interface>/statistics (Linux).
pub(super) fn read_sysfs_counters(interface_name: &str) -> Option<(u64, u64)> {
    #[cfg(target_os = "linux")]
    {
        let base = format!("/sys/class/net/{}/statistics", interface_name);
        let read = |file: &str| -> Option<u64> {
            std::fs::read_to_string(format!("{}/{}", base, file))
                .ok()?
                .trim()
                .parse()
                .ok()
        };
        Some((read("rx_bytes")?, read("tx_bytes")?))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = interface_name;
        None
    }
}

/// Interface carrying the IPv4 default route, from /proc/net/route (Linux).
pub(super) fn default_route_interface() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/net/route").ok()?;
        parse_default_route(&content)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// First row whose destination is 00000000. Header line is skipped.
pub(super) fn parse_default_route(content: &str) -> Option<String> {
    content.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?;
        let destination = fields.next()?;
        (destination == "00000000").then(|| iface.to_string())
    })
}
