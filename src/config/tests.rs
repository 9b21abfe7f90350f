use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.render.abort_delay_ms = Some(5_000);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        render: RenderOverrides {
            abort_delay_ms: Some(250),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.render.abort_delay, Duration::from_millis(250));
}

#[test]
fn render_delays_default_to_demo_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(settings.render, RenderSettings::default());
    assert_eq!(
        settings.render.data_delay,
        Duration::from_millis(DEFAULT_DATA_DELAY_MS)
    );
    assert_eq!(
        settings.render.abort_delay,
        Duration::from_millis(DEFAULT_ABORT_DELAY_MS)
    );
    assert!(settings.assets.manifest_path.is_none());
}

#[test]
fn zero_data_delay_is_allowed() {
    let mut raw = RawSettings::default();
    raw.render.data_delay_ms = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.data_delay, Duration::ZERO);
}

#[test]
fn zero_abort_delay_is_rejected() {
    let mut raw = RawSettings::default();
    raw.render.abort_delay_ms = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero deadline must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "render.abort_delay_ms",
            ..
        }
    ));
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());
    let err = Settings::from_raw(raw).expect_err("bad level must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn empty_manifest_path_falls_back_to_builtin() {
    let mut raw = RawSettings::default();
    raw.assets.manifest_path = Some(PathBuf::new());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.assets.manifest_path.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["sheetstream"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_arguments() {
    let args = CliArgs::parse_from([
        "sheetstream",
        "serve",
        "--server-port",
        "8080",
        "--render-data-delay-ms",
        "0",
        "--assets-manifest",
        "dist/manifest.json",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_port, Some(8080));
            assert_eq!(serve.overrides.render.data_delay_ms, Some(0));
            assert_eq!(
                serve.overrides.assets.manifest_path,
                Some(PathBuf::from("dist/manifest.json"))
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "sheetstream",
        "render",
        "--render-abort-delay-ms",
        "50",
        "/posts/1",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.url, "/posts/1");
            assert_eq!(render.render.abort_delay_ms, Some(50));
            assert!(!render.show_fragments);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn render_url_defaults_to_root() {
    let args = CliArgs::parse_from(["sheetstream", "render"]);
    match args.command.expect("render command") {
        Command::Render(render) => assert_eq!(render.url, "/"),
        other => panic!("unexpected command: {other:?}"),
    }
}
