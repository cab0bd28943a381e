use std::fs;
use std::path::PathBuf;

use toh264::testing::{Call, MockEngine};
use toh264::{EXIT_CONFIG, EXIT_USAGE, Error, RequestBuilder, run};

fn scratch(name: &str) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("toh264_run_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let input = dir.join(format!("{name}.mkv"));
    let output = dir.join(format!("{name}.mp4"));
    fs::write(&input, b"").unwrap();
    let _ = fs::remove_file(&output);
    (input, output)
}

#[tokio::test]
async fn test_crf_run_invokes_engine_once() {
    let (input, output) = scratch("crf_once");
    let request = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .constant_rate_factor(28)
        .audio_bitrate(64)
        .build()
        .unwrap();
    let engine = MockEngine::new();

    run(&engine, &request).await.unwrap();

    let transcodes = engine.transcode_calls();
    assert_eq!(transcodes.len(), 1);
    assert!(transcodes[0].windows(2).any(|w| w[0] == "-crf" && w[1] == "28"));
}

#[tokio::test]
async fn test_engine_exit_code_is_forwarded() {
    let (input, output) = scratch("crf_fails");
    let request = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .constant_rate_factor(28)
        .audio_bitrate(64)
        .build()
        .unwrap();
    let engine = MockEngine::new().transcode_exit_codes([69]);

    let err = run(&engine, &request).await.unwrap_err();

    assert!(matches!(err, Error::EngineFailed { code: 69, .. }));
    assert_eq!(err.exit_code(), 69);
}

#[tokio::test]
async fn test_failed_first_pass_skips_second() {
    let (input, output) = scratch("first_pass_fails");
    let request = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .target_size(10.0)
        .audio_bitrate(128)
        .build()
        .unwrap();
    let engine = MockEngine::new()
        .with_duration(100.0)
        .transcode_exit_codes([1]);

    let err = run(&engine, &request).await.unwrap_err();

    assert_eq!(err.exit_code(), 1);
    let transcodes = engine.transcode_calls();
    assert_eq!(transcodes.len(), 1);
    assert!(transcodes[0].windows(2).any(|w| w[0] == "-pass" && w[1] == "1"));
}

#[tokio::test]
async fn test_failed_second_pass_is_forwarded() {
    let (input, output) = scratch("second_pass_fails");
    let request = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .target_size(10.0)
        .audio_bitrate(128)
        .build()
        .unwrap();
    let engine = MockEngine::new()
        .with_duration(100.0)
        .transcode_exit_codes([0, 254]);

    let err = run(&engine, &request).await.unwrap_err();

    assert_eq!(err.exit_code(), 254);
    assert_eq!(engine.transcode_calls().len(), 2);
}

#[tokio::test]
async fn test_failed_probe_is_forwarded_without_transcoding() {
    let (input, output) = scratch("probe_fails");
    let request = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .target_size(10.0)
        .audio_bitrate(128)
        .build()
        .unwrap();
    let engine = MockEngine::new().probe_fails(1);

    let err = run(&engine, &request).await.unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert_eq!(engine.calls(), vec![Call::Probe(input)]);
}

#[tokio::test]
async fn test_target_too_small_is_a_config_error() {
    let (input, output) = scratch("too_small");
    let request = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .target_size(1.0)
        .audio_bitrate(128)
        .build()
        .unwrap();
    let engine = MockEngine::new().with_duration(100.0);

    let err = run(&engine, &request).await.unwrap_err();

    assert_eq!(err.exit_code(), EXIT_CONFIG);
    assert!(engine.transcode_calls().is_empty());
    assert!(!output.exists());
}

#[test]
fn test_existing_output_is_rejected_before_any_call() {
    let (input, output) = scratch("exists");
    fs::write(&output, b"keep me").unwrap();

    let err = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .constant_rate_factor(23)
        .audio_bitrate(128)
        .build()
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_USAGE);
    assert_eq!(fs::read(&output).unwrap(), b"keep me");
}

#[tokio::test]
async fn test_existing_output_with_force_reaches_the_engine() {
    let (input, output) = scratch("exists_force");
    fs::write(&output, b"replace me").unwrap();
    let request = RequestBuilder::new()
        .input(&input)
        .output(&output)
        .overwrite(true)
        .constant_rate_factor(23)
        .audio_bitrate(128)
        .build()
        .unwrap();
    let engine = MockEngine::new();

    run(&engine, &request).await.unwrap();

    let transcodes = engine.transcode_calls();
    assert_eq!(transcodes.len(), 1);
    assert!(transcodes[0].iter().any(|a| a == "-y"));
}

#[tokio::test]
async fn test_cli_to_engine() {
    let (input, output) = scratch("cli");
    let cli = toh264::cli::Cli::try_parse_normalized([
        "toh264".to_string(),
        "-i".into(),
        input.display().to_string(),
        "-o".into(),
        output.display().to_string(),
        "-fps".into(),
        "25".into(),
        "-sh".into(),
        "720".into(),
        "-crf".into(),
        "20".into(),
        "-ab".into(),
        "160".into(),
        "-m".into(),
    ])
    .unwrap();
    let request = cli.request_builder().build().unwrap();
    let engine = MockEngine::new();

    run(&engine, &request).await.unwrap();

    let args = &engine.transcode_calls()[0];
    assert!(args.windows(2).any(|w| w[0] == "-filter:v" && w[1] == "fps=25,scale=-2:720"));
    assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "160k"));
    assert!(args.windows(2).any(|w| w[0] == "-ac" && w[1] == "1"));
    assert_eq!(args.last().unwrap(), output.as_os_str());
}

#[test]
fn test_cli_conflicting_options_are_usage_errors() {
    let (input, output) = scratch("cli_conflicts");
    let base = |extra: &[&str]| {
        let mut args = vec![
            "toh264".to_string(),
            "-i".into(),
            input.display().to_string(),
            "-o".into(),
            output.display().to_string(),
            "-ab".into(),
            "128".into(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        toh264::cli::Cli::try_parse_normalized(args)
            .unwrap()
            .request_builder()
            .build()
    };

    for extra in [
        &["-crf", "20", "-t", "10"][..],
        &[][..],
        &["-crf", "52"][..],
        &["-crf", "-1"][..],
        &["-crf", "20", "-s", "1280x720", "-sw", "640"][..],
        &["-crf", "20", "-sw", "640", "-sh", "480"][..],
    ] {
        let err = base(extra).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_USAGE, "{extra:?}");
    }
}
