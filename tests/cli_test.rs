//! Command-line behaviour of the spectrum-weaver binary

mod test_utils;

use serde_json::Value;
use test_utils::*;

#[test]
fn test_tone_then_analyze_json() {
    let wav = TempFile::new("wav");
    let out = run_cli([
        "tone",
        wav.path().to_str().unwrap(),
        "--freq",
        "1000",
        "--duration",
        "0.5",
        "--sample-rate",
        "8000",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(wav.path().exists());

    let out = run_cli([
        "analyze",
        wav.path().to_str().unwrap(),
        "--window-size",
        "256",
        "--hop-size",
        "128",
        "--json",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let mut lines = stdout.lines();
    let first: Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(first["event"], "metadata");
    assert_eq!(first["audio"]["sample_rate"], 8000);

    let events: Vec<Value> = stdout
        .lines()
        .filter(|l| l.starts_with('{') && l.contains("\"event\""))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let columns = events.iter().filter(|e| e["event"] == "column").count();
    assert!(columns > 20);
    assert_eq!(events.last().unwrap()["event"], "completed");

    // Pretty summary follows the event lines
    let summary_start = stdout.find("{\n").unwrap();
    let summary: Value = serde_json::from_str(&stdout[summary_start..]).unwrap();
    assert_eq!(summary["state"], "completed");
    assert_eq!(summary["columns"], columns as u64);
    assert_eq!(summary["dominant_hz"], 1000.0);
}

#[test]
fn test_png_export() {
    let wav = tone_wav(2000.0, 16000, 16000);
    let png = TempFile::new("png");
    let out = run_cli([
        "analyze",
        wav.path().to_str().unwrap(),
        "--preset",
        "fast",
        "--png",
        png.path().to_str().unwrap(),
        "--height",
        "64",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let img = image::open(png.path()).unwrap();
    assert_eq!(img.height(), 64);
    assert!(img.width() > 10);
}

#[test]
fn test_unsupported_file_exits_nonzero() {
    let fake = raw_file("flac", b"definitely not a flac stream");
    let out = run_cli(["analyze", fake.path().to_str().unwrap()]);
    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("FAILED"));
    assert!(stdout.contains("UnsupportedFormatError"));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let wav = tone_wav(440.0, 8000, 800);
    let out = run_cli([
        "analyze",
        wav.path().to_str().unwrap(),
        "--window-size",
        "256",
        "--hop-size",
        "512",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("hop_size"));
}

#[test]
fn test_config_file() {
    let wav = tone_wav(440.0, 8000, 4000);
    let config = TempFile::new("json");
    std::fs::write(
        config.path(),
        r#"{ "window_size": 512, "hop_size": 512, "scaling": "linear" }"#,
    )
    .unwrap();

    let out = run_cli([
        "analyze",
        wav.path().to_str().unwrap(),
        "--config",
        config.path().to_str().unwrap(),
        "--json",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let column: Value = stdout
        .lines()
        .filter(|l| l.contains("\"event\":\"column\""))
        .map(|l| serde_json::from_str(l).unwrap())
        .next()
        .unwrap();
    assert_eq!(column["scaling_used"], "linear");
    assert_eq!(column["frequency_bins"].as_array().unwrap().len(), 257);
}

#[test]
fn test_presets_listing() {
    let out = run_cli(["presets"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for name in ["standard", "detailed", "fast", "speech"] {
        assert!(stdout.contains(name), "missing {}", name);
    }
}
