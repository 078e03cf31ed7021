use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::DhcpError;

/// Канал команд к CLI маршрутизатора.
///
/// Каждый вызов это один запрос и один подтверждённый ответ: реализация
/// возвращается только после того, как удалённая сторона прочитала весь скрипт.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn exec(&self, script: &str) -> Result<String, DhcpError>;
}

/// Выполняет скрипты через системный клиент `ssh`.
///
/// Аутентификация через ssh-agent или ключи; с `BatchMode=yes` отсутствие
/// учётных данных даёт ошибку, а не запрос пароля.
#[derive(Debug, Clone)]
pub struct SshShell {
    host: String,
    user: Option<String>,
    port: Option<u16>,
    jump_host: Option<String>,
    timeout: Duration,
}

impl SshShell {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            jump_host: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Подключение к маршрутизатору через промежуточный хост (`ssh -J`).
    pub fn with_jump_host(mut self, jump: impl Into<String>) -> Self {
        self.jump_host = Some(jump.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-T")
            .args(["-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.timeout.as_secs().max(1)));
        if let Some(port) = self.port {
            cmd.arg("-p").arg(port.to_string());
        }
        if let Some(jump) = &self.jump_host {
            cmd.arg("-J").arg(jump);
        }
        cmd.arg(self.destination())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn exec(&self, script: &str) -> Result<String, DhcpError> {
        tracing::debug!(host = %self.host, lines = script.lines().count(), "running remote script");

        let mut child = self.command().spawn().map_err(DhcpError::Spawn)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes()).await.map_err(DhcpError::Spawn)?;
            stdin.shutdown().await.map_err(DhcpError::Spawn)?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DhcpError::Timeout(self.timeout))?
            .map_err(DhcpError::Spawn)?;

        if !output.status.success() {
            return Err(DhcpError::Remote {
                host: self.host.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
