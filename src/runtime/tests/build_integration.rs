//! End-to-end builds through the recording engine client.

use std::sync::Arc;

use stevedore_core::event::events;
use stevedore_core::{BuildConfig, BuildError, EventEmitter};
use stevedore_runtime::engine::Call;
use stevedore_runtime::{Build, ConfigCommand, ContainerConfig, ImageInfo, RecordingClient};

fn script() -> Vec<ConfigCommand> {
    vec![
        ConfigCommand::new("FROM", ["alpine:3.19"]),
        ConfigCommand::new("ENV", ["APP_HOME", "/srv/app"]),
        ConfigCommand::new("COPY", ["app.sh", "/srv/app/"]),
        ConfigCommand::new("RUN", ["chmod", "+x", "/srv/app/app.sh"]),
        ConfigCommand::new("CMD", ["/srv/app/app.sh"]).with_attr("json", true),
    ]
}

fn base_image() -> ImageInfo {
    ImageInfo {
        id: "sha256:base".to_string(),
        config: ContainerConfig {
            hostname: "builder".to_string(),
            env: vec!["PATH=/usr/bin:/bin".to_string()],
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_planned_build_end_to_end() {
    let ctx = tempfile::tempdir().unwrap();
    std::fs::write(ctx.path().join("app.sh"), "#!/bin/sh\necho hi\n").unwrap();

    let client = Arc::new(RecordingClient::new());
    client
        .on_inspect_image(Ok(Some(base_image())))
        .on_create_container(Ok("c1"))
        .on_upload_to_container(Ok(()))
        .on_commit_container(Ok("img1"))
        .on_remove_container(Ok(()))
        .on_create_container(Ok("c2"))
        .on_run_container(Ok(()))
        .on_commit_container(Ok("img2"))
        .on_remove_container(Ok(()))
        .on_create_container(Ok("c3"))
        .on_commit_container(Ok("img3"))
        .on_remove_container(Ok(()));

    let emitter = EventEmitter::new(64);
    let mut rx = emitter.subscribe();
    let config = BuildConfig {
        context_dir: ctx.path().to_path_buf(),
        ..Default::default()
    };
    let mut build = Build::new(config, client.clone()).with_events(emitter);

    let state = build.run_script(script()).await.unwrap();

    client.assert_exhausted();
    assert_eq!(state.image_id, "img3");
    assert!(!state.has_container());
    assert!(state.commit_msg.is_empty());
    assert_eq!(state.config.hostname, "builder");
    assert_eq!(
        state.config.env,
        vec!["PATH=/usr/bin:/bin", "APP_HOME=/srv/app"]
    );

    let commits: Vec<(String, String)> = client
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::CommitContainer { state, message } => Some((state.container_id, message)),
            _ => None,
        })
        .collect();
    assert_eq!(
        commits,
        vec![
            ("c1".to_string(), "ENV APP_HOME=/srv/app".to_string()),
            ("c2".to_string(), String::new()),
            ("c3".to_string(), "CMD [\"/srv/app/app.sh\"]".to_string()),
        ]
    );

    let uploads: Vec<String> = client
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::UploadToContainer { id, dest_dir, .. } => Some(format!("{}:{}", id, dest_dir)),
            _ => None,
        })
        .collect();
    assert_eq!(uploads, vec!["c1:/srv/app"]);

    let mut keys = Vec::new();
    while let Ok(event) = rx.try_recv() {
        keys.push(event.key);
    }
    assert_eq!(keys.last().map(String::as_str), Some(events::BUILD_COMPLETED));
    assert_eq!(
        keys.iter()
            .filter(|k| k.as_str() == events::BUILD_STEP_COMPLETED)
            .count(),
        8
    );
}

#[tokio::test]
async fn test_failed_run_cleans_up() {
    let client = Arc::new(RecordingClient::new());
    client
        .on_inspect_image(Ok(Some(base_image())))
        .on_create_container(Ok("c1"))
        .on_run_container(Err("exit status 2"))
        .on_remove_container(Ok(()));

    let mut build = Build::new(BuildConfig::default(), client.clone());
    let err = build
        .run_script(vec![
            ConfigCommand::new("FROM", ["alpine:3.19"]),
            ConfigCommand::new("RUN", ["false"]),
        ])
        .await
        .unwrap_err();

    client.assert_exhausted();
    assert!(matches!(err, BuildError::Engine { ref instruction, .. } if instruction == "RUN"));
    assert_eq!(client.count("remove_container"), 1);
    assert_eq!(build.state().image_id, "sha256:base");
    assert!(!build.state().has_container());
}

#[tokio::test]
async fn test_unknown_instruction_runs_nothing() {
    let client = Arc::new(RecordingClient::new());
    let mut build = Build::new(BuildConfig::default(), client.clone());

    let err = build
        .run_script(vec![
            ConfigCommand::new("FROM", ["alpine"]),
            ConfigCommand::new("ONBUILD", ["RUN", "true"]),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Unknown instruction: ONBUILD");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_explicit_commit_after_run() {
    let client = Arc::new(RecordingClient::new());
    client
        .on_inspect_image(Ok(Some(base_image())))
        .on_create_container(Ok("c1"))
        .on_run_container(Ok(()))
        .on_commit_container(Ok("img1"))
        .on_remove_container(Ok(()));

    let mut build = Build::new(BuildConfig::default(), client.clone());
    let state = build
        .run_script(vec![
            ConfigCommand::new("FROM", ["alpine"]),
            ConfigCommand::new("RUN", ["make"]),
            ConfigCommand::new("COMMIT", Vec::<String>::new()),
        ])
        .await
        .unwrap();

    client.assert_exhausted();
    assert_eq!(state.image_id, "img1");
    assert_eq!(client.count("commit_container"), 1);
}
