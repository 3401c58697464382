use async_trait::async_trait;
use stevedore_core::error::{BuildError, Result};

use super::builder::Build;
use super::command::{require_args, Command, ConfigCommand};
use super::state::State;

/// `FROM <image>`: resolve the base image, pulling it when missing.
#[derive(Debug, Clone)]
pub struct CommandFrom {
    cfg: ConfigCommand,
}

impl CommandFrom {
    pub fn new(cfg: ConfigCommand) -> Result<Self> {
        require_args(&cfg, 1, Some(1))?;
        Ok(Self { cfg })
    }

    fn image(&self) -> &str {
        &self.cfg.args[0]
    }
}

#[async_trait]
impl Command for CommandFrom {
    fn name(&self) -> &'static str {
        "FROM"
    }

    fn args(&self) -> &[String] {
        &self.cfg.args
    }

    async fn execute(&self, build: &Build) -> Result<State> {
        let name = self.image();
        let client = build.client();
        let mut pulled = false;

        if build.config().pull {
            tracing::info!(image = name, "Pulling image");
            build.call(self.name(), client.pull_image(name)).await?;
            pulled = true;
        }

        let mut image = build.call(self.name(), client.inspect_image(name)).await?;

        if image.is_none() && !pulled {
            tracing::info!(image = name, "Image not found locally, pulling");
            build.call(self.name(), client.pull_image(name)).await?;
            image = build.call(self.name(), client.inspect_image(name)).await?;
        }

        let image = image.ok_or_else(|| BuildError::ImageNotFound {
            instruction: self.name().to_string(),
            image: name.to_string(),
        })?;

        tracing::debug!(image = name, image_id = %image.id, "Base image resolved");

        let mut state = build.state().clone();
        state.image_id = image.id;
        state.config = image.config;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use stevedore_core::config::BuildConfig;

    use super::*;
    use crate::build::state::ContainerConfig;
    use crate::build::testing::make_build;
    use crate::engine::{Call, ImageInfo};

    fn from(image: &str) -> CommandFrom {
        CommandFrom::new(ConfigCommand::new("from", [image])).unwrap()
    }

    fn localhost_image() -> ImageInfo {
        ImageInfo {
            id: "123".to_string(),
            config: ContainerConfig {
                hostname: "localhost".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_from_existing() {
        let (b, c) = make_build(BuildConfig::default());
        c.on_inspect_image(Ok(Some(localhost_image())));

        let state = from("existing").execute(&b).await.unwrap();

        c.assert_exhausted();
        assert_eq!(c.calls(), vec![Call::InspectImage("existing".to_string())]);
        assert_eq!(state.image_id, "123");
        assert_eq!(state.config.hostname, "localhost");
    }

    #[tokio::test]
    async fn test_from_pull_existing() {
        let config = BuildConfig {
            pull: true,
            ..Default::default()
        };
        let (b, c) = make_build(config);
        c.on_pull_image(Ok(()))
            .on_inspect_image(Ok(Some(localhost_image())));

        let state = from("existing").execute(&b).await.unwrap();

        c.assert_exhausted();
        assert_eq!(
            c.calls(),
            vec![
                Call::PullImage("existing".to_string()),
                Call::InspectImage("existing".to_string()),
            ]
        );
        assert_eq!(state.image_id, "123");
        assert_eq!(state.config.hostname, "localhost");
    }

    #[tokio::test]
    async fn test_from_not_existing() {
        let (b, c) = make_build(BuildConfig::default());
        c.on_inspect_image(Ok(None))
            .on_pull_image(Ok(()))
            .on_inspect_image(Ok(Some(ImageInfo {
                id: "123".to_string(),
                ..Default::default()
            })));

        let state = from("not-existing").execute(&b).await.unwrap();

        c.assert_exhausted();
        assert_eq!(
            c.calls(),
            vec![
                Call::InspectImage("not-existing".to_string()),
                Call::PullImage("not-existing".to_string()),
                Call::InspectImage("not-existing".to_string()),
            ]
        );
        assert_eq!(state.image_id, "123");
    }

    #[tokio::test]
    async fn test_from_after_pull_not_existing() {
        let (b, c) = make_build(BuildConfig::default());
        c.on_inspect_image(Ok(None))
            .on_pull_image(Ok(()))
            .on_inspect_image(Ok(None));

        let err = from("not-existing").execute(&b).await.unwrap_err();

        c.assert_exhausted();
        assert_eq!(c.calls().len(), 3);
        assert_eq!(
            err.to_string(),
            "FROM: Failed to inspect image after pull: not-existing"
        );
    }

    #[tokio::test]
    async fn test_from_pull_always_not_existing() {
        let config = BuildConfig {
            pull: true,
            ..Default::default()
        };
        let (b, c) = make_build(config);
        c.on_pull_image(Ok(())).on_inspect_image(Ok(None));

        let err = from("ghost").execute(&b).await.unwrap_err();

        assert_eq!(c.count("pull_image"), 1);
        assert_eq!(c.count("inspect_image"), 1);
        assert!(matches!(err, BuildError::ImageNotFound { ref image, .. } if image == "ghost"));
    }

    #[tokio::test]
    async fn test_from_replaces_config() {
        let (b, c) = make_build(BuildConfig::default());
        let b = b.with_state(State {
            config: ContainerConfig {
                env: vec!["OLD=1".to_string()],
                user: "root".to_string(),
                ..Default::default()
            },
            ..Default::default()
        });
        c.on_inspect_image(Ok(Some(localhost_image())));

        let state = from("existing").execute(&b).await.unwrap();

        assert!(state.config.env.is_empty());
        assert!(state.config.user.is_empty());
        assert_eq!(b.state().config.user, "root");
    }

    #[tokio::test]
    async fn test_from_inspect_error() {
        let (b, c) = make_build(BuildConfig::default());
        c.on_inspect_image(Err("connection refused"));

        let err = from("existing").execute(&b).await.unwrap_err();

        assert_eq!(err.to_string(), "FROM: daemon error: connection refused");
        assert_eq!(c.count("pull_image"), 0);
    }

    #[test]
    fn test_from_requires_one_argument() {
        assert!(CommandFrom::new(ConfigCommand::new("from", ["a", "b"])).is_err());
        assert!(CommandFrom::new(ConfigCommand::new("from", Vec::<String>::new())).is_err());
    }
}
