//! HTTP document source for the snippet fetcher.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;

use crate::{
    application::snippet::{DocumentSource, FetchError},
    config::SnippetSettings,
};

use super::error::InfraError;

pub struct HttpDocumentSource {
    client: Client,
    max_body_bytes: usize,
}

impl HttpDocumentSource {
    pub fn new(settings: &SnippetSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            max_body_bytes: settings.max_body_bytes.get(),
        })
    }

    fn request_error(url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Self::request_error(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(too_large());
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| Self::request_error(url, err))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}
