use crate::http::request::{Request, validate_host};
use crate::kernel::error::Error;

#[test]
fn test_host_and_port_parsing() {
    let request = Request::get("/node/1?page=2").with_host("WWW.Example.com:8080");
    assert_eq!(request.host(), "www.example.com");
    assert_eq!(request.port(), 8080);
    assert_eq!(request.scheme_and_http_host(), "http://www.example.com:8080");
    assert_eq!(request.path(), "/node/1");
    assert_eq!(request.query(), Some("page=2"));

    let secure = Request::get("/").with_host("example.com").with_https(true);
    assert_eq!(secure.port(), 443);
    assert_eq!(secure.scheme_and_http_host(), "https://example.com");

    let ipv6 = Request::get("/").with_host("[::1]:8888");
    assert_eq!(ipv6.host(), "[::1]");
    assert_eq!(ipv6.port(), 8888);
}

#[test]
fn test_headers_are_case_insensitive() {
    let request = Request::get("/").with_header("X-Forwarded-For", "10.0.0.1").with_user_agent("simpletest123");
    assert_eq!(request.header("x-forwarded-for"), Some("10.0.0.1"));
    assert_eq!(request.user_agent(), Some("simpletest123"));
}

#[test]
fn test_method_cacheability() {
    assert!(Request::get("/").is_method_cacheable());
    assert!(Request::new("head", "/").is_method_cacheable());
    assert!(!Request::new("POST", "/").is_method_cacheable());
}

#[test]
fn test_validate_host_accepts_common_hosts() {
    for host in ["example.com", "localhost:8888", "sub-domain.example.co.uk", "[::1]:80", "my_host.local"] {
        assert!(validate_host(host).is_ok(), "{} should be valid", host);
    }
}

#[test]
fn test_validate_host_rejects_malicious_hosts() {
    let too_long = "a".repeat(1001);
    let too_many_dots = format!("a{}", ".a".repeat(101));
    for host in ["", "exa mple.com", "example.com/evil", "evil.com\\@good.com", too_long.as_str(), too_many_dots.as_str()] {
        match validate_host(host) {
            Err(Error::InvalidHost { host: rejected }) => assert_eq!(rejected, host),
            other => panic!("{:?} should be rejected, got {:?}", host, other),
        }
    }
}
