use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::Clipboard;
use crate::error::HostError;

/// Placeholder replaced with the payload's MIME type in an image command.
pub const MIME_PLACEHOLDER: &str = "{mime}";

/// Clipboard backed by external programs such as `wl-copy` or `xclip`.
///
/// The payload is piped to the program's stdin. Images are only supported
/// when an image command is configured.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    text_command: Vec<String>,
    image_command: Option<Vec<String>>,
}

impl CommandClipboard {
    pub fn new(text_command: Vec<String>, image_command: Option<Vec<String>>) -> Self {
        Self {
            text_command,
            image_command: image_command.filter(|argv| !argv.is_empty()),
        }
    }
}

#[async_trait]
impl Clipboard for CommandClipboard {
    async fn write_text(&self, text: &str) -> Result<(), HostError> {
        pipe_into(&self.text_command, text.as_bytes()).await
    }

    fn supports_images(&self) -> bool {
        self.image_command.is_some()
    }

    async fn write_image(&self, payload: &[u8], mime_type: &str) -> Result<(), HostError> {
        let Some(argv) = &self.image_command else {
            return Err(HostError::Rejected("no image clipboard command configured".to_string()));
        };
        let argv: Vec<String> = argv.iter().map(|arg| arg.replace(MIME_PLACEHOLDER, mime_type)).collect();
        pipe_into(&argv, payload).await
    }
}

async fn pipe_into(argv: &[String], input: &[u8]) -> Result<(), HostError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(HostError::Rejected("empty clipboard command".to_string()));
    };
    let command_line = argv.join(" ");
    debug!(command = %command_line, bytes = input.len(), "piping into clipboard command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| HostError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).await.map_err(|source| HostError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        // Dropping stdin closes the pipe so the program sees EOF.
    }

    let status = child.wait().await.map_err(|source| HostError::Spawn {
        command: command_line.clone(),
        source,
    })?;
    if !status.success() {
        return Err(HostError::CommandFailed {
            command: command_line,
            status: status.to_string(),
        });
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn text_is_piped_to_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clip.txt");
        let clipboard = CommandClipboard::new(sh(&format!("cat > '{}'", out.display())), None);

        clipboard.write_text("héllo").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "héllo");
        assert!(!clipboard.supports_images());
    }

    #[tokio::test]
    async fn mime_placeholder_is_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mime.txt");
        let mut image = sh(&format!("cat > /dev/null; printf '%s' \"$0\" > '{}'", out.display()));
        image.push(MIME_PLACEHOLDER.into());
        let clipboard = CommandClipboard::new(sh("cat > /dev/null"), Some(image));

        assert!(clipboard.supports_images());
        clipboard.write_image(&[0x89, 0x50], "image/png").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "image/png");
    }

    #[tokio::test]
    async fn failing_command_is_reported() {
        let clipboard = CommandClipboard::new(sh("cat > /dev/null; exit 3"), None);
        let err = clipboard.write_text("x").await.unwrap_err();
        assert!(matches!(err, HostError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let clipboard = CommandClipboard::new(vec!["definitely-not-a-clipboard-tool".into()], None);
        let err = clipboard.write_text("x").await.unwrap_err();
        assert!(matches!(err, HostError::Spawn { .. }));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let clipboard = CommandClipboard::new(Vec::new(), Some(Vec::new()));
        assert!(!clipboard.supports_images());
        assert!(matches!(clipboard.write_text("x").await, Err(HostError::Rejected(_))));
    }
}
