//! Token storage backends.

use std::{io, path::PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use super::Token;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait TokenPersistence: Send + Sync {
    async fn load(&self) -> Result<Option<Token>, PersistenceError>;
    async fn save(&self, token: &Token) -> Result<(), PersistenceError>;
    async fn delete(&self) -> Result<(), PersistenceError>;
}

/// Discards every token.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTokenPersistence;

#[async_trait::async_trait]
impl TokenPersistence for NullTokenPersistence {
    async fn load(&self) -> Result<Option<Token>, PersistenceError> {
        Ok(None)
    }

    async fn save(&self, _token: &Token) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn delete(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Keeps the token for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryTokenPersistence {
    token: Mutex<Option<Token>>,
}

impl MemoryTokenPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

#[async_trait::async_trait]
impl TokenPersistence for MemoryTokenPersistence {
    async fn load(&self) -> Result<Option<Token>, PersistenceError> {
        Ok(self.token.lock().await.clone())
    }

    async fn save(&self, token: &Token) -> Result<(), PersistenceError> {
        self.token.lock().await.replace(token.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), PersistenceError> {
        self.token.lock().await.take();
        Ok(())
    }
}

/// Stores the token as JSON in a local file.
///
/// On unix the file is only readable by its owner.
#[derive(Debug, Clone)]
pub struct FileTokenPersistence {
    path: PathBuf,
}

impl FileTokenPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl TokenPersistence for FileTokenPersistence {
    async fn load(&self) -> Result<Option<Token>, PersistenceError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let token = serde_json::from_slice(&contents)?;
        Ok(Some(token))
    }

    async fn save(&self, token: &Token) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_vec_pretty(token)?;
        tokio::fs::write(&self.path, contents).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, perms).await?;
        }

        debug!(message = "Token saved", path = %self.path.display());
        Ok(())
    }

    async fn delete(&self) -> Result<(), PersistenceError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_token() -> Token {
        Token {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn null_persistence_forgets_everything() {
        let persistence = NullTokenPersistence;
        persistence.save(&sample_token()).await.unwrap();
        assert_eq!(persistence.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_persistence_keeps_last_token() {
        let persistence = MemoryTokenPersistence::new();
        assert_eq!(persistence.load().await.unwrap(), None);

        persistence.save(&sample_token()).await.unwrap();
        assert_eq!(persistence.load().await.unwrap(), Some(sample_token()));

        persistence.delete().await.unwrap();
        assert_eq!(persistence.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_persistence_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        FileTokenPersistence::new(&path)
            .save(&sample_token())
            .await
            .unwrap();
        assert!(path.exists());

        let loaded = FileTokenPersistence::new(&path).load().await.unwrap();
        assert_eq!(loaded, Some(sample_token()));
    }

    #[tokio::test]
    async fn file_persistence_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let persistence = FileTokenPersistence::new(dir.path().join("missing.json"));
        assert_eq!(persistence.load().await.unwrap(), None);
        persistence.delete().await.unwrap();
    }

    #[tokio::test]
    async fn file_persistence_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileTokenPersistence::new(&path).load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Json(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_persistence_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        FileTokenPersistence::new(&path)
            .save(&sample_token())
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
