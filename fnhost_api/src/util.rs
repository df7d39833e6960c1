// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use std::net::IpAddr;

#[derive(PartialEq, Eq, Debug)]
pub enum Proto {
    HTTP,
    HTTPS,
}

/// Parse the protocol, host and port from an URL such as `http://127.0.0.1:50051`.
///
/// IPv6 hosts may be written in brackets; they are returned without them.
/// Host names are returned verbatim, resolution is left to the socket layer.
pub fn parse_http_host(raw: &str) -> anyhow::Result<(Proto, String, u16)> {
    let re = regex::Regex::new(r"^(\w+)://(.*):(\d+)/?$")?;
    let val = match re.captures(raw.trim()) {
        Some(val) => val,
        None => anyhow::bail!("URL parse error, got '{}'", raw),
    };
    let proto = match &val[1] {
        "http" => Proto::HTTP,
        "https" => Proto::HTTPS,
        _ => anyhow::bail!("unsupported protocol in '{}'", raw),
    };
    let port = match val[3].parse::<u16>() {
        Ok(port) => port,
        Err(_) => anyhow::bail!("port parse error, got '{}'", raw),
    };
    let maybe_an_ip = val[2]
        .parse::<IpAddr>()
        .ok()
        .or_else(|| val[2].strip_prefix('[')?.strip_suffix(']')?.parse::<IpAddr>().ok());
    let host = match maybe_an_ip {
        Some(ip) => ip.to_string(),
        None => {
            let fallback = val[2].trim().to_string();
            if fallback.is_empty() {
                anyhow::bail!("host parse error, got '{}'", raw);
            }
            fallback
        }
    };
    Ok((proto, host, port))
}

/// Turn a configured listen address into the `host:port` form accepted by
/// `tokio::net::TcpListener::bind`.
///
/// Both `host:port` and `http://host:port` are accepted.
pub fn listen_address(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if raw.contains("://") {
        let (_proto, host, port) = parse_http_host(raw)?;
        return Ok(match host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, port),
            _ => format!("{}:{}", host, port),
        });
    }
    match raw.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(raw.to_string()),
        _ => anyhow::bail!("invalid listen address '{}': expected host:port", raw),
    }
}

pub fn create_template(path: &str, content: &str) -> anyhow::Result<()> {
    assert!(!path.is_empty());
    match std::path::Path::new(&path).exists() {
        true => anyhow::bail!("cannot overwrite configuration file: {}", path),
        false => {
            std::fs::write(path, content)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_http_host() {
        assert!(parse_http_host("http://192.168.3.3").is_err(), "missing port");
        assert!(parse_http_host("coap://127.0.0.1:7035").is_err(), "unsupported protocol");
        assert_eq!(
            parse_http_host("http://127.0.0.1:50051").unwrap(),
            (Proto::HTTP, String::from("127.0.0.1"), 50051u16)
        );
        assert_eq!(
            parse_http_host("https://example.com:50051/").unwrap(),
            (Proto::HTTPS, String::from("example.com"), 50051u16)
        );
        assert_eq!(
            parse_http_host("http://[::1]:50051").unwrap(),
            (Proto::HTTP, String::from("::1"), 50051u16)
        );
    }

    #[test]
    fn test_listen_address() {
        assert_eq!("127.0.0.1:50051", listen_address("127.0.0.1:50051").unwrap());
        assert_eq!("0.0.0.0:50051", listen_address(" http://0.0.0.0:50051 ").unwrap());
        assert_eq!("[::1]:50051", listen_address("http://[::1]:50051").unwrap());
        assert_eq!("localhost:50051", listen_address("localhost:50051").unwrap());
        assert!(listen_address("127.0.0.1").is_err());
        assert!(listen_address(":50051").is_err());
        assert!(listen_address("127.0.0.1:99999").is_err());
    }

    #[test]
    fn test_create_template_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        let path = path.to_str().unwrap();

        create_template(path, "name = \"x\"\n").unwrap();
        assert_eq!("name = \"x\"\n", std::fs::read_to_string(path).unwrap());
        assert!(create_template(path, "name = \"y\"\n").is_err());
    }
}
