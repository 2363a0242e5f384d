//! Backend selected by `backend.kind`.

use peereval_core::storage::BackendKind;
use peereval_core::{
    Allocation, Config, Database, EvaluationWindow, FetchError, PeerRef, Preference, RestBackend,
    RosterProvider, SinkError, StudentRecord, SubmissionSink, WindowProvider,
};

pub enum Backend {
    Local(Database),
    Remote(RestBackend),
}

impl Backend {
    pub fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        tracing::debug!(kind = ?config.backend.kind, "opening backend");
        match config.backend.kind {
            BackendKind::Local => Ok(Self::Local(Database::open()?)),
            BackendKind::Remote => {
                let key = config
                    .backend
                    .resolved_api_key()
                    .ok_or("no API key; set backend.api_key or PEEREVAL_API_KEY")?;
                Ok(Self::Remote(RestBackend::new(&config.backend.base_url, key)?))
            }
        }
    }

    /// The local database, for commands that edit records.
    pub fn local(&self) -> Result<&Database, Box<dyn std::error::Error>> {
        match self {
            Self::Local(db) => Ok(db),
            Self::Remote(_) => Err("this command only works with the local backend".into()),
        }
    }

    pub async fn students(&self) -> Result<Vec<StudentRecord>, Box<dyn std::error::Error>> {
        match self {
            Self::Local(db) => Ok(db.students()?),
            Self::Remote(rest) => Ok(rest.students().await?),
        }
    }

    pub async fn preferences(&self) -> Result<Vec<Preference>, Box<dyn std::error::Error>> {
        match self {
            Self::Local(db) => Ok(db.preferences()?),
            Self::Remote(rest) => Ok(rest.preferences().await?),
        }
    }
}

impl RosterProvider for Backend {
    async fn fetch_peers(&self, current_user_id: &str) -> Result<Vec<PeerRef>, FetchError> {
        match self {
            Self::Local(db) => db.fetch_peers(current_user_id).await,
            Self::Remote(rest) => rest.fetch_peers(current_user_id).await,
        }
    }
}

impl WindowProvider for Backend {
    async fn fetch_window(&self) -> Result<EvaluationWindow, FetchError> {
        match self {
            Self::Local(db) => db.fetch_window().await,
            Self::Remote(rest) => rest.fetch_window().await,
        }
    }
}

impl SubmissionSink for Backend {
    async fn submit_allocation(
        &self,
        current_user_id: &str,
        allocation: &Allocation,
    ) -> Result<(), SinkError> {
        match self {
            Self::Local(db) => db.submit_allocation(current_user_id, allocation).await,
            Self::Remote(rest) => rest.submit_allocation(current_user_id, allocation).await,
        }
    }
}
