use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_fastq(reads: &[&str]) -> NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".fastq").tempfile().expect("create temp fastq");
    for (i, read) in reads.iter().enumerate() {
        writeln!(f, "@read{}\n{}\n+\n{}", i, read, "I".repeat(read.len())).unwrap();
    }
    f
}

fn kfreq() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kfreq"));
    // Keep the working directory free of a stray kfreq.toml
    cmd.current_dir(std::env::temp_dir());
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn prints_counts_then_duration() {
    let fastq = write_fastq(&["ACGTACGTAC", "TTACGTTT"]);
    let output = kfreq()
        .args(["-k", "4", "-n", "2", "--strategy", "partitioned", "-f"])
        .arg(fastq.path())
        .output()
        .expect("run kfreq");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "ACGT: 3");
    assert_eq!(lines[1], "CGTA: 2");
    assert!(lines[2].starts_with("Duration: ") && lines[2].ends_with(" seconds"));
}

#[test]
fn json_report() {
    let fastq = write_fastq(&["AAAAAA"]);
    let output = kfreq()
        .args(["-k", "3", "-n", "1", "--json", "--strategy", "partitioned", "-f"])
        .arg(fastq.path())
        .output()
        .expect("run kfreq");

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["entries"][0]["kmer"], "AAA");
    assert_eq!(report["entries"][0]["count"], 4);
    assert_eq!(report["plan"]["strategy"], "filtered");
    assert_eq!(report["strategy"], "partitioned");
}

#[test]
fn rejects_out_of_range_rate() {
    let output = kfreq()
        .args(["-f", "reads.fq", "-k", "4", "-n", "2", "-e", "1.0"])
        .output()
        .expect("run kfreq");
    assert!(!output.status.success());
}

#[test]
fn missing_file_gives_suggestions() {
    let output = kfreq()
        .args(["-f", "/nonexistent/kfreq/reads.fq", "-k", "4", "-n", "2"])
        .output()
        .expect("run kfreq");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File not found"));
    assert!(stderr.contains("Suggestions:"));
}

#[test]
fn print_config_is_valid_toml() {
    let output = kfreq().arg("--print-config").output().expect("run kfreq");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    let value: toml::Value = toml::from_str(&text).unwrap();
    assert_eq!(value["budget"]["target_disk_gb"].as_integer(), Some(50));
}
