//! Booted deployment discovery on a fake sysroot

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::symlink;

use entsync_ostree::{DeploymentInspector, OstreeSysroot};
use entsync_test_utils::TestEnv;

fn sysroot(env: &TestEnv) -> OstreeSysroot {
    OstreeSysroot::new(
        env.root(),
        env.root().join("run/ostree-booted"),
        env.root().join("proc/cmdline"),
    )
}

#[test]
fn resolves_origin_through_boot_link() {
    let env = TestEnv::new();
    let deployment = env.root().join("ostree/deploy/awesome/deploy/abc123.0");
    fs::create_dir_all(&deployment).unwrap();
    fs::create_dir_all(env.root().join("ostree/boot.1/awesome/abc123")).unwrap();
    symlink(&deployment, env.root().join("ostree/boot.1/awesome/abc123/0")).unwrap();
    env.write("run/ostree-booted", "");
    env.write(
        "proc/cmdline",
        "BOOT_IMAGE=/ostree/awesome/vmlinuz ostree=/ostree/boot.1/awesome/abc123/0 rhgb quiet\n",
    );

    let origin = sysroot(&env).booted_origin().unwrap().unwrap();

    let expected = deployment
        .canonicalize()
        .unwrap()
        .with_file_name("abc123.0.origin");
    assert_eq!(origin, expected);
}

#[test]
fn missing_marker_means_not_booted() {
    let env = TestEnv::new();
    env.write("proc/cmdline", "ostree=/ostree/boot.1/awesome/abc123/0\n");

    assert_eq!(sysroot(&env).booted_origin().unwrap(), None);
}

#[test]
fn booted_without_karg_is_an_error() {
    let env = TestEnv::new();
    env.write("run/ostree-booted", "");
    env.write("proc/cmdline", "BOOT_IMAGE=/vmlinuz quiet\n");

    let err = sysroot(&env).booted_origin().unwrap_err();
    assert!(err.to_string().contains("ostree="), "{}", err);
}

#[test]
fn dangling_boot_link_is_an_error() {
    let env = TestEnv::new();
    env.write("run/ostree-booted", "");
    env.write("proc/cmdline", "ostree=/ostree/boot.1/awesome/missing/0\n");

    assert!(sysroot(&env).booted_origin().is_err());
}
