use std::process::Command;

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_replink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("replink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_includes_target_info() {
    let output = Command::new(env!("CARGO_BIN_EXE_replink"))
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version --extended should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: replink"));
    assert!(stdout.contains(&format!("version: {}", env!("CARGO_PKG_VERSION"))));
    assert!(stdout.contains("target_os:"));
}

#[test]
fn probe_missing_device_exits_with_transport_code() {
    let missing = format!(
        "/tmp/replink-missing-{}-{}.tty",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    );

    let output = Command::new(env!("CARGO_BIN_EXE_replink"))
        .arg("--log-level")
        .arg("error")
        .arg("probe")
        .arg("--device")
        .arg(&missing)
        .arg("--settle-secs")
        .arg("0")
        .output()
        .expect("probe should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open failed"));
}

#[test]
fn umbrella_reexports_cover_the_stack() {
    use replink::driver::PENDING_CEILING;
    use replink::frame::{Packet, ResultCode, START_BYTE};

    let mut packet = Packet::new();
    packet.push_u8(0).expect("one byte fits");
    assert_eq!(packet.result, ResultCode::Ok);
    assert_eq!(START_BYTE, 0xD5);
    assert_eq!(PENDING_CEILING, 20);
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_replink"))
        .arg("frobnicate")
        .output()
        .expect("clap should report the usage error");

    assert_eq!(output.status.code(), Some(2));
}
