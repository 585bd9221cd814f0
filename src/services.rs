//! Well-known TCP services, for labelling open ports in reports.

/// Probable service behind a port, if it is a well-known one.
pub fn service_name(port: u16) -> Option<&'static str> {
    let name = match port {
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        80 => "http",
        88 => "kerberos",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        161 => "snmp",
        389 => "ldap",
        443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        515 => "printer",
        548 => "afp",
        554 => "rtsp",
        587 => "submission",
        631 => "ipp",
        636 => "ldaps",
        873 => "rsync",
        993 => "imaps",
        995 => "pop3s",
        1080 => "socks",
        1194 => "openvpn",
        1433 => "mssql",
        1883 => "mqtt",
        1900 => "ssdp",
        2049 => "nfs",
        3000 => "http-dev",
        3306 => "mysql",
        3389 => "rdp",
        5000 => "upnp",
        5353 => "mdns",
        5432 => "postgresql",
        5900 => "vnc",
        6379 => "redis",
        8000 | 8008 | 8081 | 8888 => "http-alt",
        8080 => "http-proxy",
        8443 => "https-alt",
        9100 => "jetdirect",
        27017 => "mongodb",
        62078 => "iphone-sync",
        _ => return None,
    };
    Some(name)
}

/// Service name, or "unknown".
pub fn service_label(port: u16) -> &'static str {
    service_name(port).unwrap_or("unknown")
}
