//! HTTP implementation of the folder backend.

use std::time::Duration;

use arbor_core::{BackendId, ClientConfig};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::backend::{
    BackendError, CreateFolderRequest, FolderBackend, FolderRecord, NestedFolderRequest,
    UpdateFolderRequest,
};

/// Folder backend reached over its REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    /// Build a client using the configured base URL and timeout.
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(BackendError::Client)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn folder_url(&self, folder: &BackendId) -> String {
        self.config.endpoint(&format!("folder/{folder}"))
    }

    async fn send(&self, url: String, request: RequestBuilder) -> Result<Response, BackendError> {
        tracing::debug!(%url, "backend request");
        let response = request
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, %status, "backend request failed");
            return Err(BackendError::Status { status, body });
        }
        Ok(response)
    }

    async fn json(&self, url: String, request: RequestBuilder) -> Result<Value, BackendError> {
        let response = self.send(url.clone(), request).await?;
        response
            .json()
            .await
            .map_err(|source| BackendError::Transport { url, source })
    }
}

#[async_trait]
impl FolderBackend for HttpBackend {
    async fn hierarchy(&self) -> Result<Value, BackendError> {
        let url = self.config.endpoint("hierarchical-structure");
        self.json(url.clone(), self.client.get(&url)).await
    }

    async fn subfolders(&self, folder: &BackendId) -> Result<Value, BackendError> {
        let url = self.config.endpoint(&format!("folder/{folder}/subfolders"));
        self.json(url.clone(), self.client.get(&url)).await
    }

    async fn create_folder(
        &self,
        request: &CreateFolderRequest,
    ) -> Result<FolderRecord, BackendError> {
        let url = self.config.endpoint("folder/create");
        let body = self.json(url.clone(), self.client.post(&url).json(request)).await?;
        FolderRecord::from_response(body)
    }

    async fn update_folder(
        &self,
        folder: &BackendId,
        request: &UpdateFolderRequest,
    ) -> Result<(), BackendError> {
        let url = self.folder_url(folder);
        self.send(url.clone(), self.client.put(&url).json(request)).await?;
        Ok(())
    }

    async fn delete_folder(&self, folder: &BackendId) -> Result<(), BackendError> {
        let url = self.folder_url(folder);
        self.send(url.clone(), self.client.delete(&url)).await?;
        Ok(())
    }

    async fn create_nested(
        &self,
        request: &NestedFolderRequest,
    ) -> Result<FolderRecord, BackendError> {
        let url = self.config.endpoint("folder/create-nested");
        let body = self.json(url.clone(), self.client.post(&url).json(request)).await?;
        FolderRecord::from_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_urls() {
        let backend = HttpBackend::new(ClientConfig::new("http://localhost:3000/api/")).unwrap();
        assert_eq!(
            backend.folder_url(&BackendId::from("abc")),
            "http://localhost:3000/api/folder/abc"
        );
        assert_eq!(backend.config().timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9")
            .timeout_secs(1u64)
            .build()
            .unwrap();
        let backend = HttpBackend::new(config).unwrap();
        let err = backend.hierarchy().await.unwrap_err();
        assert!(matches!(err, BackendError::Transport { .. }));
    }
}
