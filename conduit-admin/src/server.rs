//! The TCP accept loop and per-connection command dispatch.
//!
//! Deliberately not built on `axum`/`tower` — this is a raw line protocol,
//! not an HTTP surface. Graceful-shutdown integration
//! (stop accepting, let in-flight commands finish, then return) is
//! grounded in `conduit_core::builder::shutdown_signal`, reused verbatim
//! for this listener's own task.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::backend::AdminBackend;
use crate::locks::LockStore;
use crate::protocol::{Command, HELP_TEXT};

pub struct AdminServer {
    backend: Arc<dyn AdminBackend>,
    locks: LockStore,
}

impl AdminServer {
    pub fn new(backend: Arc<dyn AdminBackend>, locks: LockStore) -> Arc<Self> {
        Arc::new(Self { backend, locks })
    }

    /// Accept connections on `addr` until `shutdown_rx` fires or the
    /// process receives SIGTERM/SIGINT, then stop accepting and return —
    /// in-flight connections finish their current command naturally since
    /// each is its own spawned task reading one line at a time.
    pub async fn serve(self: Arc<Self>, addr: &str, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "admin control plane listening");

        loop {
            tokio::select! {
                _ = conduit_core::builder::shutdown_signal() => break,
                _ = shutdown_rx.changed() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "admin accept failed");
                            continue;
                        }
                    };
                    let this = self.clone();
                    tokio::spawn(async move {
                        if let Err(err) = this.handle_connection(stream).await {
                            tracing::debug!(%peer, error = %err, "admin connection closed with error");
                        }
                    });
                }
            }
        }

        tracing::info!("admin control plane stopped accepting connections");
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream) -> std::io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.dispatch(&line).await;
            let exit = matches!(Command::parse(&line), Ok(Command::Exit));
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            if exit {
                break;
            }
        }
        Ok(())
    }

    async fn dispatch(&self, line: &str) -> String {
        let command = match Command::parse(line) {
            Ok(c) => c,
            Err(err) => return format!("ERROR {err}"),
        };

        match command {
            Command::Version => self.backend.version(),
            Command::Shutdown => {
                self.backend.shutdown().await;
                "OK shutting down".to_string()
            }
            Command::UserGenToken { username, acl } => match self.backend.user_gen_token(&username, &acl).await {
                Ok(token) => token,
                Err(err) => format!("ERROR {err}"),
            },
            Command::AppGenToken { table, acl } => match self.backend.app_gen_token(&table, &acl).await {
                Ok(token) => token,
                Err(err) => format!("ERROR {err}"),
            },
            Command::ShowConfig => self.backend.show_config().await.to_string(),
            Command::ShowRules => self.backend.show_rules().await.to_string(),
            Command::NodeInfo { target, route_type } => self.backend.node_info(&target, &route_type).await.to_string(),
            Command::ConfigReload => match self.backend.config_reload().await {
                Ok(()) => "OK config reloaded".to_string(),
                Err(err) => format!("ERROR {err}"),
            },
            Command::Load(name) => result_response(self.backend.load_plugin(&name).await),
            Command::Unload(name) => result_response(self.backend.unload_plugin(&name).await),
            Command::Reload(name) => result_response(self.backend.reload_plugin(&name).await),
            Command::ReloadAll => result_response(self.backend.reload_all_plugins().await),
            Command::List => self.backend.list().await.join(", "),
            Command::ListPlugins => self.backend.list_plugins().await.to_string(),
            Command::ListActions => self.backend.list_actions().await.join(", "),
            Command::Routes => self.backend.routes().await.to_string(),
            Command::RequestLog(id) => match self.backend.request_log(&id).await {
                Some(value) => value.to_string(),
                None => format!("ERROR no request log entry for {id:?}"),
            },
            Command::ValidateConfig => match self.backend.validate_config().await {
                Ok(()) => "OK config valid".to_string(),
                Err(err) => format!("ERROR {err}"),
            },
            Command::Unlock(file) => match self.locks.unlock(&file).await {
                Ok(()) => "OK".to_string(),
                Err(err) => format!("ERROR {err}"),
            },
            Command::Permalock { file, user } => match self.locks.permalock(&file, &user).await {
                Ok(()) => "OK".to_string(),
                Err(err) => format!("ERROR {err}"),
            },
            Command::ListLocks => match self.locks.list_locks().await {
                Ok(locks) => locks.into_iter().map(|(file, user)| format!("{file}={user}")).collect::<Vec<_>>().join(", "),
                Err(err) => format!("ERROR {err}"),
            },
            Command::Help => HELP_TEXT.to_string(),
            Command::Exit => "bye".to_string(),
        }
    }
}

fn result_response(result: Result<(), String>) -> String {
    match result {
        Ok(()) => "OK".to_string(),
        Err(err) => format!("ERROR {err}"),
    }
}
