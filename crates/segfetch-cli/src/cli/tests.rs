use super::*;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_get_minimal() {
    match parse(&["segfetch", "get", "https://example.com/file.iso"]) {
        CliCommand::Get {
            url,
            file,
            dir,
            threads,
            chunk,
            stall_timeout,
            sha256,
            expect_sha256,
        } => {
            assert_eq!(url, "https://example.com/file.iso");
            assert!(file.is_none() && dir.is_none());
            assert!(threads.is_none() && chunk.is_none() && stall_timeout.is_none());
            assert!(!sha256);
            assert!(expect_sha256.is_none());
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_get_all_flags() {
    match parse(&[
        "segfetch",
        "get",
        "https://example.com/a.bin",
        "-f",
        "out.bin",
        "-d",
        "/tmp/dl",
        "-t",
        "32",
        "-c",
        "65536",
        "--stall-timeout",
        "15",
        "--sha256",
        "--expect-sha256",
        "abc123",
    ]) {
        CliCommand::Get {
            file,
            dir,
            threads,
            chunk,
            stall_timeout,
            sha256,
            expect_sha256,
            ..
        } => {
            assert_eq!(file, Some(PathBuf::from("out.bin")));
            assert_eq!(dir, Some(PathBuf::from("/tmp/dl")));
            assert_eq!(threads, Some(32));
            assert_eq!(chunk, Some(65536));
            assert_eq!(stall_timeout, Some(15));
            assert!(sha256);
            assert_eq!(expect_sha256.as_deref(), Some("abc123"));
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_threads_out_of_range() {
    assert!(Cli::try_parse_from(["segfetch", "get", "http://h/f", "-t", "0"]).is_err());
    assert!(Cli::try_parse_from(["segfetch", "get", "http://h/f", "-t", "10001"]).is_err());
    assert!(Cli::try_parse_from(["segfetch", "get", "http://h/f", "-t", "10000"]).is_ok());
}

#[test]
fn cli_parse_get_requires_url() {
    assert!(Cli::try_parse_from(["segfetch", "get"]).is_err());
}

#[test]
fn cli_parse_checksum() {
    match parse(&["segfetch", "checksum", "/tmp/file.iso"]) {
        CliCommand::Checksum { path } => assert_eq!(path, "/tmp/file.iso"),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["segfetch", "config"]), CliCommand::Config));
}
