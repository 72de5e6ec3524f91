#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use swmlink_node::config;

#[test]
fn ok_minimal_config() {
    let ok = r#"
short-name: "planner"
timeout: 5000
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.short_name, "planner");
    assert_eq!(cfg.request_timeout(), Duration::from_millis(5000));
    assert_eq!(cfg.group, config::DEFAULT_GROUP);
    assert_eq!(cfg.poll_quantum(), Duration::from_millis(50));
    assert!(!cfg.match_direct_messages);
    assert!(!cfg.shutdown_on_timeout);
    assert!(cfg.header_pairs().is_empty());
}

#[test]
fn missing_short_name_is_rejected() {
    let err = config::load_from_str("timeout: 5000\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}

#[test]
fn missing_timeout_is_rejected() {
    let err = config::load_from_str("short-name: planner\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}

#[test]
fn non_positive_timeout_is_rejected() {
    for bad in ["0", "-1", "\"soon\""] {
        let text = format!("short-name: planner\ntimeout: {bad}\n");
        let err = config::load_from_str(&text).expect_err("must fail");
        assert_eq!(err.code().as_str(), "INVALID_CONFIG", "timeout {bad}");
    }
}

#[test]
fn empty_short_name_is_rejected() {
    let err = config::load_from_str("short-name: \"  \"\ntimeout: 10\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}

#[test]
fn poll_quantum_out_of_range_is_rejected() {
    let text = "short-name: planner\ntimeout: 10\npoll-quantum-ms: 0\n";
    assert!(config::load_from_str(text).is_err());
    let text = "short-name: planner\ntimeout: 10\npoll-quantum-ms: 5000\n";
    assert!(config::load_from_str(text).is_err());
}

#[test]
fn extra_keys_become_headers() {
    let text = r#"
short-name: planner
timeout: 1000
group: swm
role: client
level: 3
caps: [query, update]
"#;
    let cfg = config::load_from_str(text).unwrap();
    assert_eq!(cfg.group, "swm");
    let headers = cfg.header_pairs();
    assert_eq!(
        headers,
        vec![
            ("caps".to_string(), r#"["query","update"]"#.to_string()),
            ("level".to_string(), "3".to_string()),
            ("role".to_string(), "client".to_string()),
        ]
    );
}

#[test]
fn json_config_files_are_accepted() {
    let text = r#"{"short-name": "legacy", "timeout": 2000, "ipc_endpoint": "ipc:///tmp/x"}"#;
    let cfg = config::load_from_str(text).unwrap();
    assert_eq!(cfg.short_name, "legacy");
    assert_eq!(
        cfg.header_pairs(),
        vec![("ipc_endpoint".to_string(), "ipc:///tmp/x".to_string())]
    );
}

#[test]
fn unreadable_file_is_invalid_config() {
    let err = config::load_from_file("does/not/exist.yaml").expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}
