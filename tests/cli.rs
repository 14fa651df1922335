mod common;

use common::*;
use std::process::Command;

fn rebuild_stackmap() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rebuild-stackmap"))
}

#[test]
fn writes_the_rebuilt_class() {
    let input_root = temp_dir("cli-input");
    let output_root = temp_dir("cli-output");
    let input = write_class(&input_root, "com/acme/Sample", &sample_class());

    let output = rebuild_stackmap()
        .arg(&input)
        .arg("max")
        .arg("--descriptor")
        .arg("(JJ)J")
        .arg("--output-dir")
        .arg(&output_root)
        .arg("--no-jdk")
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("method: max"), "{}", stdout);
    assert!(stdout.contains(&format!("output directory: {}", output_root.display())));
    assert!(output_root.join("com/acme/Sample.class").is_file());
}

#[test]
fn fails_on_unknown_method() {
    let input_root = temp_dir("cli-unknown");
    let output_root = temp_dir("cli-unknown-output");
    let input = write_class(&input_root, "com/acme/Sample", &sample_class());

    let output = rebuild_stackmap()
        .arg(&input)
        .arg("nope")
        .arg("--output-dir")
        .arg(&output_root)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!output_root.join("com/acme/Sample.class").exists());
}

#[test]
fn java_home_supplies_jdk_classes() {
    let input_root = temp_dir("cli-jdk");
    let output_root = temp_dir("cli-jdk-output");
    let input = write_class(&input_root, "com/acme/Flow", &flow_class());
    let java_home = fake_jdk(&io_exception_classes());

    let output = rebuild_stackmap()
        .arg(&input)
        .arg("open")
        .arg("--output-dir")
        .arg(&output_root)
        .arg("--no-jdk")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!output_root.join("com/acme/Flow.class").exists());

    let output = rebuild_stackmap()
        .arg(&input)
        .arg("open")
        .arg("--output-dir")
        .arg(&output_root)
        .arg("--java-home")
        .arg(&java_home)
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);
    assert!(output_root.join("com/acme/Flow.class").is_file());
}

#[test]
fn requires_a_method() {
    let output = rebuild_stackmap().arg("Foo.class").output().unwrap();
    assert!(!output.status.success());
}
